//! Users repository for authentication
//!
//! Password hashing happens in [`crate::services::auth`]; this layer only
//! stores and reads the hash.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::integrity::is_unique_violation;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    /// Salted bcrypt hash, never sent to clients
    #[serde(skip_serializing, default)]
    pub password: String,
    pub company_name: String,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for UserRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password: row.try_get("password")?,
            company_name: row.try_get("company_name")?,
        })
    }
}

/// Input for inserting a user; `password_hash` must already be hashed
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub password_hash: String,
    pub company_name: String,
}

pub struct UsersRepository {
    pool: PgPool,
}

impl UsersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, user: CreateUser) -> Result<UserRecord> {
        let result = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, username, password, company_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password, company_name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.company_name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record),
            Err(e) if is_unique_violation(&e) => Err(Error::UsernameTaken(user.username)),
            Err(e) => Err(e.into()),
        }
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, password, company_name FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Get the company a user belongs to
    pub async fn company_by_username(&self, username: &str) -> Result<Option<String>> {
        let company = sqlx::query_scalar::<_, String>(
            "SELECT company_name FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(company)
    }

    /// Company name of every user, one entry per user
    pub async fn all_companies(&self) -> Result<Vec<String>> {
        let companies = sqlx::query_scalar::<_, String>("SELECT company_name FROM users")
            .fetch_all(&self.pool)
            .await?;

        Ok(companies)
    }
}
