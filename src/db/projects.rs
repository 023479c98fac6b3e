//! Project database repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::integrity::is_integrity_violation;
use crate::error::Result;

/// Status every project starts with; this layer never changes it
pub const INITIAL_PROJECT_STATUS: &str = "In Progress";

/// Project record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub company_name: String,
    pub vehicle_name: String,
    pub location: String,
    pub create_ts: DateTime<Utc>,
    pub status: String,
    pub vin_interpret: String,
    pub file_format: String,
    pub file_location: String,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for ProjectRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            id: row.try_get("id")?,
            company_name: row.try_get("company_name")?,
            vehicle_name: row.try_get("vehicle_name")?,
            location: row.try_get("location")?,
            create_ts: row.try_get("create_ts")?,
            status: row.try_get("status")?,
            vin_interpret: row.try_get("vin_interpret")?,
            file_format: row.try_get("file_format")?,
            file_location: row.try_get("file_location")?,
        })
    }
}

/// Input for creating a project
///
/// A caller-supplied `status` is accepted for payload compatibility and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub company_name: String,
    pub vehicle_name: String,
    pub location: String,
    pub create_ts: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<String>,
    pub vin_interpret: String,
    pub file_format: String,
    pub file_location: String,
}

/// Selection for [`ProjectRepository::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectFilter {
    All,
    Company(String),
}

impl From<&str> for ProjectFilter {
    /// `"all"` selects every project, anything else is an exact company name
    fn from(filter: &str) -> Self {
        if filter == "all" {
            ProjectFilter::All
        } else {
            ProjectFilter::Company(filter.to_string())
        }
    }
}

/// Result of a single-row create that recovers from integrity conflicts
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome<T> {
    /// The row was committed; the value is what the store returned
    Created(T),
    /// The insert was rolled back; the value was never persisted
    Conflict(T),
}

impl<T> CreateOutcome<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            CreateOutcome::Created(value) | CreateOutcome::Conflict(value) => value,
        }
    }
}

const PROJECT_COLUMNS: &str = "id, company_name, vehicle_name, location, create_ts, status, \
                               vin_interpret, file_format, file_location";

pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a project by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>> {
        let record = sqlx::query_as::<_, ProjectRecord>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// List projects, either all of them or those of one company
    pub async fn list(&self, filter: &ProjectFilter) -> Result<Vec<ProjectRecord>> {
        let records = match filter {
            ProjectFilter::All => {
                sqlx::query_as::<_, ProjectRecord>(&format!(
                    "SELECT {PROJECT_COLUMNS} FROM projects"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            ProjectFilter::Company(company_name) => {
                sqlx::query_as::<_, ProjectRecord>(&format!(
                    "SELECT {PROJECT_COLUMNS} FROM projects WHERE company_name = $1"
                ))
                .bind(company_name)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(records)
    }

    /// Create a new project with status "In Progress"
    ///
    /// An integrity conflict is not an error: the statement is rolled back and
    /// the unsaved record comes back as [`CreateOutcome::Conflict`]. The
    /// shipped schema has no unique key on `projects` besides the generated
    /// id, so this only happens once a deployment adds its own constraint.
    pub async fn create(&self, input: CreateProject) -> Result<CreateOutcome<ProjectRecord>> {
        let pending = ProjectRecord {
            id: Uuid::new_v4(),
            company_name: input.company_name,
            vehicle_name: input.vehicle_name,
            location: input.location,
            create_ts: input.create_ts,
            status: INITIAL_PROJECT_STATUS.to_string(),
            vin_interpret: input.vin_interpret,
            file_format: input.file_format,
            file_location: input.file_location,
        };

        let result = sqlx::query_as::<_, ProjectRecord>(&format!(
            r#"
            INSERT INTO projects (
                id, company_name, vehicle_name, location, create_ts, status,
                vin_interpret, file_format, file_location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(pending.id)
        .bind(&pending.company_name)
        .bind(&pending.vehicle_name)
        .bind(&pending.location)
        .bind(pending.create_ts)
        .bind(&pending.status)
        .bind(&pending.vin_interpret)
        .bind(&pending.file_format)
        .bind(&pending.file_location)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(CreateOutcome::Created(record)),
            Err(e) if is_integrity_violation(&e) => {
                tracing::warn!(
                    project_id = %pending.id,
                    company_name = %pending.company_name,
                    error = %e,
                    "Project insert rolled back"
                );
                Ok(CreateOutcome::Conflict(pending))
            }
            Err(e) => Err(e.into()),
        }
    }
}
