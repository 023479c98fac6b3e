//! Database connection and repositories

pub mod ecu_scans;
pub mod flash_stats;
pub mod integrity;
pub mod projects;
pub mod references;
pub mod users;

use std::time::Duration;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use crate::error::Result;

pub use ecu_scans::{
    CreateEcuScan, EcuScanRecord, EcuScanRepository, IngestReport, RejectedScan, VerifiedStatus,
};
pub use flash_stats::{FlashStatsRecord, FlashStatsRepository};
pub use projects::{
    CreateOutcome, CreateProject, ProjectFilter, ProjectRecord, ProjectRepository,
};
pub use references::{CreateReference, ReferenceRecord, ReferenceRepository, ReplaceReport};
pub use users::{CreateUser, UserRecord, UsersRepository};

/// Schema the repositories are written against
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new database connection pool
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new database connection pool, retrying every `retry_interval`
    /// until the server accepts connections
    pub async fn connect_with_retry(
        url: &str,
        max_connections: u32,
        retry_interval: Duration,
    ) -> Self {
        loop {
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
            {
                Ok(pool) => return Self { pool },
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_secs = retry_interval.as_secs(),
                        "Database connection failed"
                    );
                    tokio::time::sleep(retry_interval).await;
                }
            }
        }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a project repository
    pub fn projects(&self) -> ProjectRepository {
        ProjectRepository::new(self.pool.clone())
    }

    /// Get a reference data repository
    pub fn references(&self) -> ReferenceRepository {
        ReferenceRepository::new(self.pool.clone())
    }

    /// Get an ECU scan repository
    pub fn ecu_scans(&self) -> EcuScanRepository {
        EcuScanRepository::new(self.pool.clone())
    }

    /// Get the flash statistics report
    pub fn flash_stats(&self) -> FlashStatsRepository {
        FlashStatsRepository::new(self.pool.clone())
    }

    /// Get a users repository
    pub fn users(&self) -> UsersRepository {
        UsersRepository::new(self.pool.clone())
    }
}
