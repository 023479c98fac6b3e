//! Reference data repository
//!
//! A project's reference rows are only ever replaced as a whole. Replacing
//! them invalidates every scan result of the project, so those are purged in
//! the same transaction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// Reference record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub id: Uuid,
    pub ecu_name: String,
    pub ecu_signature: String,
    pub parameter_name: String,
    pub verification_method: String,
    pub tag_1: String,
    pub tag_2: String,
    pub tag_interpret: String,
    pub project_id: Uuid,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for ReferenceRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            id: row.try_get("id")?,
            ecu_name: row.try_get("ecu_name")?,
            ecu_signature: row.try_get("ecu_signature")?,
            parameter_name: row.try_get("parameter_name")?,
            verification_method: row.try_get("verification_method")?,
            tag_1: row.try_get("tag_1")?,
            tag_2: row.try_get("tag_2")?,
            tag_interpret: row.try_get("tag_interpret")?,
            project_id: row.try_get("project_id")?,
        })
    }
}

/// One reference row; the project comes from the replace call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReference {
    pub ecu_name: String,
    pub ecu_signature: String,
    pub parameter_name: String,
    pub verification_method: String,
    #[serde(default)]
    pub tag_1: String,
    #[serde(default)]
    pub tag_2: String,
    #[serde(default)]
    pub tag_interpret: String,
}

/// What a reference replacement did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Reference rows of the previous set that were deleted
    pub removed: u64,
    /// Rows of the new set that were stored
    pub inserted: usize,
    /// Rows of the new set refused by the store (duplicates, unknown project)
    pub rejected: Vec<CreateReference>,
    /// Scan results deleted because they were verified against the old set
    pub purged_scans: u64,
}

pub struct ReferenceRepository {
    pool: PgPool,
}

impl ReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace the reference set of a project and purge its scan results
    ///
    /// Order inside the transaction: old references out, new references in,
    /// then the project's scans deleted. New rows are applied in input order;
    /// the first of two duplicates wins.
    pub async fn replace_for_project(
        &self,
        project_id: Uuid,
        references: &[CreateReference],
    ) -> Result<ReplaceReport> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM reference WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let ids: Vec<Uuid> = references.iter().map(|_| Uuid::new_v4()).collect();
        let mut inserted = HashSet::new();

        if !references.is_empty() {
            let ecu_names: Vec<&str> = references.iter().map(|r| r.ecu_name.as_str()).collect();
            let signatures: Vec<&str> = references.iter().map(|r| r.ecu_signature.as_str()).collect();
            let parameters: Vec<&str> = references.iter().map(|r| r.parameter_name.as_str()).collect();
            let methods: Vec<&str> = references
                .iter()
                .map(|r| r.verification_method.as_str())
                .collect();
            let tags_1: Vec<&str> = references.iter().map(|r| r.tag_1.as_str()).collect();
            let tags_2: Vec<&str> = references.iter().map(|r| r.tag_2.as_str()).collect();
            let interprets: Vec<&str> = references.iter().map(|r| r.tag_interpret.as_str()).collect();

            let rows = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO reference (
                    id, ecu_name, ecu_signature, parameter_name, verification_method,
                    tag_1, tag_2, tag_interpret, project_id
                )
                SELECT r.id, r.ecu_name, r.ecu_signature, r.parameter_name,
                       r.verification_method, r.tag_1, r.tag_2, r.tag_interpret, $9::uuid
                FROM UNNEST(
                    $1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[],
                    $6::text[], $7::text[], $8::text[]
                ) WITH ORDINALITY AS r (
                    id, ecu_name, ecu_signature, parameter_name, verification_method,
                    tag_1, tag_2, tag_interpret, ord
                )
                WHERE EXISTS (SELECT 1 FROM projects p WHERE p.id = $9)
                ORDER BY r.ord
                ON CONFLICT DO NOTHING
                RETURNING id
                "#,
            )
            .bind(&ids)
            .bind(&ecu_names)
            .bind(&signatures)
            .bind(&parameters)
            .bind(&methods)
            .bind(&tags_1)
            .bind(&tags_2)
            .bind(&interprets)
            .bind(project_id)
            .fetch_all(&mut *tx)
            .await?;

            inserted.extend(rows);
        }

        let purged_scans = sqlx::query("DELETE FROM ecu_scan WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let rejected: Vec<CreateReference> = ids
            .iter()
            .zip(references)
            .filter(|(id, _)| !inserted.contains(*id))
            .map(|(_, reference)| reference.clone())
            .collect();

        for reference in &rejected {
            tracing::warn!(
                project_id = %project_id,
                ecu_name = %reference.ecu_name,
                ecu_signature = %reference.ecu_signature,
                "Skipped conflicting reference row"
            );
        }

        tracing::info!(
            project_id = %project_id,
            removed,
            inserted = inserted.len(),
            rejected = rejected.len(),
            purged_scans,
            "Replaced reference data"
        );

        Ok(ReplaceReport {
            removed,
            inserted: inserted.len(),
            rejected,
            purged_scans,
        })
    }

    /// Get the reference set of a project, sorted by ECU name
    pub async fn list_for_project(&self, project_id: Uuid) -> Result<Vec<ReferenceRecord>> {
        let records = sqlx::query_as::<_, ReferenceRecord>(
            r#"
            SELECT id, ecu_name, ecu_signature, parameter_name, verification_method,
                   tag_1, tag_2, tag_interpret, project_id
            FROM reference
            WHERE project_id = $1
            ORDER BY ecu_name
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
