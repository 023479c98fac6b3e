//! Data access and session layer for ECU flash verification tracking
//!
//! Persists scan results, reference data and projects in PostgreSQL, builds
//! per-VIN flash statistics, and issues and refreshes bearer tokens.
//!
//! Everything goes through a [`Database`] handle supplied by the caller:
//!
//! ```ignore
//! let config = Config::load()?;
//! let db = Database::connect(&config.database_url, config.max_connections).await?;
//!
//! let report = db.ecu_scans().insert_batch(&scans).await?;
//! let stats = db.flash_stats().for_project(project_id).await?;
//!
//! let auth = AuthService::new(db.clone(), config.auth.clone());
//! if let Some(user) = auth.authenticate_user("alice", "secret").await? {
//!     let token = auth.create_token(&user)?;
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use config::{AuthConfig, Config};
pub use db::Database;
pub use error::{Error, Result};
pub use services::AuthService;
