//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Lifetime of an issued bearer token, in seconds
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum connection pool size
    pub max_connections: u32,

    /// Token signing and password hashing settings
    pub auth: AuthConfig,
}

/// Token and password settings, fixed for the life of the process
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: String,
    /// Seconds from issue (or refresh) until a token expires
    pub token_lifetime_secs: i64,
    /// Bcrypt cost factor
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    /// Load configuration, reading a `.env` file first if one exists
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v.parse().context("Invalid DATABASE_MAX_CONNECTIONS")?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        // Trim any whitespace/newlines from the secret
        let jwt_secret = lookup("JWT_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET is required")?;

        let token_lifetime_secs = match lookup("TOKEN_LIFETIME_SECS") {
            Some(v) => v.parse().context("Invalid TOKEN_LIFETIME_SECS")?,
            None => DEFAULT_TOKEN_LIFETIME_SECS,
        };

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(v) => v.parse().context("Invalid BCRYPT_COST")?,
            None => bcrypt::DEFAULT_COST,
        };

        Ok(Self {
            database_url,
            max_connections,
            auth: AuthConfig {
                jwt_secret,
                token_lifetime_secs,
                bcrypt_cost,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/vrs"),
            ("JWT_SECRET", "  s3cret\n"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/vrs");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.token_lifetime_secs, 3600);
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/vrs"),
            ("DATABASE_MAX_CONNECTIONS", "3"),
            ("JWT_SECRET", "abc"),
            ("TOKEN_LIFETIME_SECS", "60"),
            ("BCRYPT_COST", "4"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 3);
        assert_eq!(config.auth.token_lifetime_secs, 60);
        assert_eq!(config.auth.bcrypt_cost, 4);
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db/vrs")]))
            .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/vrs"),
            ("JWT_SECRET", "   "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/vrs"),
            ("JWT_SECRET", "abc"),
            ("TOKEN_LIFETIME_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TOKEN_LIFETIME_SECS"));
    }

    #[test]
    fn test_auth_config_new_uses_fixed_lifetime() {
        let auth = AuthConfig::new("k");
        assert_eq!(auth.token_lifetime_secs, DEFAULT_TOKEN_LIFETIME_SECS);
    }
}
