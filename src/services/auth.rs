//! Authentication service for user sign-up, login and bearer tokens
//!
//! Provides:
//! - User registration with bcrypt-hashed passwords
//! - Credential checks that fail with `None` rather than an error
//! - HS256 token issue and refresh

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::{CreateUser, Database, UserRecord};
use crate::error::{Error, Result};

// ============================================================================
// Token Types
// ============================================================================

/// Claims written into a freshly issued token: the user's public attributes
/// plus expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub id: Uuid,
    pub username: String,
    pub company_name: String,
    /// Expiration timestamp (Unix seconds)
    pub exp: i64,
}

/// Token returned after successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "bearer"
    pub token_type: String,
}

/// Sign-up input
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    pub company_name: String,
}

// ============================================================================
// Token Issuer
// ============================================================================

/// Signs and re-signs bearer tokens with the configured secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: i64,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            lifetime_secs: config.token_lifetime_secs,
        }
    }

    fn expiry(&self) -> i64 {
        Utc::now().timestamp() + self.lifetime_secs
    }

    /// Issue a token for a user, valid for the configured lifetime
    pub fn create_token(&self, user: &UserRecord) -> Result<TokenResponse> {
        let claims = UserClaims {
            id: user.id,
            username: user.username.clone(),
            company_name: user.company_name.clone(),
            exp: self.expiry(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(Error::TokenEncode)?;

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        })
    }

    /// Re-sign a valid token with a fresh expiry
    ///
    /// Every claim except `exp` is carried over untouched. A token that is
    /// malformed, signed with another key or already expired yields
    /// [`Error::InvalidToken`].
    pub fn refresh_token(&self, token: &str) -> Result<String> {
        let mut claims = self.decode_claims(token)?;
        claims.insert("exp".to_string(), Value::from(self.expiry()));

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(Error::TokenEncode)
    }

    /// Verify the signature and, when present, the expiry
    ///
    /// `exp` is optional and may be fractional, so it is checked here rather
    /// than by `jsonwebtoken`, which requires an integer claim.
    fn decode_claims(&self, token: &str) -> Result<Map<String, Value>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_aud = false;

        let claims = decode::<Map<String, Value>>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                Error::InvalidToken
            })?;

        if !expiry_is_valid(claims.get("exp"), Utc::now().timestamp()) {
            tracing::debug!("Token expired or carries a malformed exp claim");
            return Err(Error::InvalidToken);
        }

        Ok(claims)
    }
}

/// An absent `exp` never expires; a present one must be a number not in the past
fn expiry_is_valid(exp: Option<&Value>, now: i64) -> bool {
    match exp {
        None => true,
        Some(value) => value.as_f64().is_some_and(|exp| exp >= now as f64),
    }
}

// ============================================================================
// Auth Service
// ============================================================================

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    config: AuthConfig,
    tokens: TokenIssuer,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(db: Database, config: AuthConfig) -> Self {
        let tokens = TokenIssuer::new(&config);
        Self { db, config, tokens }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Look up a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        self.db.users().get_by_username(username).await
    }

    /// Register a new user
    pub async fn create_user(&self, input: RegisterInput) -> Result<UserRecord> {
        let password_hash = hash_password(&input.password, self.config.bcrypt_cost)?;

        let user = self
            .db
            .users()
            .create(CreateUser {
                username: input.username,
                password_hash,
                company_name: input.company_name,
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Created user");
        Ok(user)
    }

    /// Check a username/password pair
    ///
    /// `None` means unknown user or wrong password; both look the same to the
    /// caller.
    pub async fn authenticate_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>> {
        let Some(user) = self.get_user_by_username(username).await? else {
            return Ok(None);
        };

        if !verify_password(password, &user.password)? {
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Issue a token for an authenticated user
    pub fn create_token(&self, user: &UserRecord) -> Result<TokenResponse> {
        self.tokens.create_token(user)
    }

    /// Extend the expiry of a token
    pub fn refresh_token(&self, token: &str) -> Result<String> {
        self.tokens.refresh_token(token)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Hash a password with bcrypt
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(hash(password, cost)?)
}

/// Verify a password against a stored bcrypt hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    Ok(verify(password, password_hash)?)
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig::new(SECRET))
    }

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: "alice".into(),
            password: String::new(),
            company_name: "Acme Motors".into(),
        }
    }

    fn sign(claims: &Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn read_claims(token: &str) -> Map<String, Value> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims
    }

    #[test]
    fn test_create_token_embeds_public_user_fields() {
        let user = user();
        let before = Utc::now().timestamp();
        let response = issuer().create_token(&user).unwrap();

        assert_eq!(response.token_type, "bearer");

        let claims = read_claims(&response.access_token);
        assert_eq!(claims["id"], json!(user.id));
        assert_eq!(claims["username"], "alice");
        assert_eq!(claims["company_name"], "Acme Motors");
        assert!(claims.get("password").is_none());

        let exp = claims["exp"].as_i64().unwrap();
        assert!(exp >= before + 3600);
        assert!(exp <= Utc::now().timestamp() + 3600);
    }

    #[test]
    fn test_refresh_keeps_claims_and_extends_expiry() {
        let original_exp = Utc::now().timestamp() + 60;
        let token = sign(
            &json!({
                "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                "username": "bob",
                "company_name": "Acme Motors",
                "plant": "north",
                "exp": original_exp,
            }),
            SECRET,
        );

        let refreshed = issuer().refresh_token(&token).unwrap();
        let mut claims = read_claims(&refreshed);

        let exp = claims.remove("exp").and_then(|v| v.as_i64()).unwrap();
        assert!(exp > original_exp);

        let expected = json!({
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "username": "bob",
            "company_name": "Acme Motors",
            "plant": "north",
        });
        assert_eq!(Value::Object(claims), expected);
    }

    #[test]
    fn test_refresh_rejects_foreign_signature() {
        let token = sign(
            &json!({ "username": "mallory", "exp": Utc::now().timestamp() + 600 }),
            "some-other-secret",
        );
        assert_matches!(issuer().refresh_token(&token), Err(Error::InvalidToken));
    }

    #[test]
    fn test_refresh_rejects_swapped_payload() {
        let issuer = issuer();
        let genuine = issuer.create_token(&user()).unwrap().access_token;
        let forged = sign(
            &json!({ "username": "admin", "exp": Utc::now().timestamp() + 600 }),
            "attacker",
        );

        let genuine_parts: Vec<&str> = genuine.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let tampered = format!("{}.{}.{}", genuine_parts[0], forged_parts[1], genuine_parts[2]);

        assert_matches!(issuer.refresh_token(&tampered), Err(Error::InvalidToken));
    }

    #[test]
    fn test_refresh_rejects_garbage_and_expired_tokens() {
        let issuer = issuer();
        assert_matches!(issuer.refresh_token(""), Err(Error::InvalidToken));
        assert_matches!(issuer.refresh_token("not.a.token"), Err(Error::InvalidToken));

        let expired = sign(
            &json!({ "username": "carol", "exp": Utc::now().timestamp() - 3600 }),
            SECRET,
        );
        assert_matches!(issuer.refresh_token(&expired), Err(Error::InvalidToken));
    }

    #[test]
    fn test_refresh_accepts_fractional_expiry() {
        let original_exp = Utc::now().timestamp() as f64 + 60.5;
        let token = sign(&json!({ "username": "dave", "exp": original_exp }), SECRET);

        let refreshed = issuer().refresh_token(&token).unwrap();
        let claims = read_claims(&refreshed);
        assert_eq!(claims["username"], "dave");
        assert!(claims["exp"].as_i64().unwrap() as f64 > original_exp);
    }

    #[test]
    fn test_refresh_adds_expiry_to_token_without_one() {
        let token = sign(&json!({ "username": "erin", "company_name": "Acme" }), SECRET);

        let refreshed = issuer().refresh_token(&token).unwrap();
        let claims = read_claims(&refreshed);
        assert_eq!(claims["username"], "erin");
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_expiry_check() {
        assert!(expiry_is_valid(None, 1_000));
        assert!(expiry_is_valid(Some(&json!(1_000)), 1_000));
        assert!(expiry_is_valid(Some(&json!(1_000.5)), 1_000));
        assert!(!expiry_is_valid(Some(&json!(999.9)), 1_000));
        assert!(!expiry_is_valid(Some(&json!("1000")), 1_000));
    }

    #[test]
    fn test_configured_lifetime_is_used() {
        let mut config = AuthConfig::new(SECRET);
        config.token_lifetime_secs = 120;
        let response = TokenIssuer::new(&config).create_token(&user()).unwrap();

        let exp = read_claims(&response.access_token)["exp"].as_i64().unwrap();
        assert!(exp <= Utc::now().timestamp() + 120);
        assert!(exp > Utc::now().timestamp() + 60);
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hashed = hash_password("hunter2", 4).unwrap();
        assert!(hashed != "hunter2");
        assert!(verify_password("hunter2", &hashed).unwrap());
        assert!(!verify_password("hunter3", &hashed).unwrap());
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let a = hash_password("same", 4).unwrap();
        let b = hash_password("same", 4).unwrap();
        assert!(a != b);
    }

    #[test]
    fn test_malformed_stored_hash_is_an_error() {
        assert_matches!(
            verify_password("whatever", "plaintext"),
            Err(Error::PasswordHash(_))
        );
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
