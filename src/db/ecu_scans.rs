//! ECU scan results: batch ingestion and latest-scan lookup
//!
//! Scan rows are written once by [`EcuScanRepository::insert_batch`] and only
//! ever removed wholesale when a project's reference data is replaced.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// Verification outcome of one ECU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VerifiedStatus {
    Ok,
    Fail,
    Other(String),
}

impl VerifiedStatus {
    pub fn as_str(&self) -> &str {
        match self {
            VerifiedStatus::Ok => "OK",
            VerifiedStatus::Fail => "Fail",
            VerifiedStatus::Other(s) => s,
        }
    }
}

impl From<String> for VerifiedStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OK" => VerifiedStatus::Ok,
            "Fail" => VerifiedStatus::Fail,
            _ => VerifiedStatus::Other(s),
        }
    }
}

impl From<VerifiedStatus> for String {
    fn from(status: VerifiedStatus) -> Self {
        status.as_str().to_string()
    }
}

/// ECU scan record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcuScanRecord {
    pub id: Uuid,
    pub ecu_name: String,
    pub vin: String,
    pub sign_found: String,
    pub sign_ref: String,
    pub filename: String,
    pub verified_status: VerifiedStatus,
    pub verified: bool,
    pub verified_ts: DateTime<Utc>,
    pub flash_error: String,
    pub project_id: Uuid,
    pub vin_error: String,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for EcuScanRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let verified_status: String = row.try_get("verified_status")?;

        Ok(Self {
            id: row.try_get("id")?,
            ecu_name: row.try_get("ecu_name")?,
            vin: row.try_get("vin")?,
            sign_found: row.try_get("sign_found")?,
            sign_ref: row.try_get("sign_ref")?,
            filename: row.try_get("filename")?,
            verified_status: VerifiedStatus::from(verified_status),
            verified: row.try_get("verified")?,
            verified_ts: row.try_get("verified_ts")?,
            flash_error: row.try_get("flash_error")?,
            project_id: row.try_get("project_id")?,
            vin_error: row.try_get("vin_error")?,
        })
    }
}

/// One scan result as produced by the vehicle scanning client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEcuScan {
    pub ecu_name: String,
    pub vin: String,
    pub sign_found: String,
    pub sign_ref: String,
    pub filename: String,
    pub verified_status: VerifiedStatus,
    pub verified: bool,
    pub verified_ts: DateTime<Utc>,
    #[serde(default)]
    pub flash_error: String,
    pub project_id: Uuid,
    #[serde(default)]
    pub vin_error: String,
}

/// A scan result the store refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedScan {
    pub filename: String,
    pub vin: String,
    pub ecu_name: String,
}

/// Outcome of a batch insert; a partial batch is a normal result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub rejected: Vec<RejectedScan>,
}

const ECU_SCAN_COLUMNS: &str = "id, ecu_name, vin, sign_found, sign_ref, filename, \
                                verified_status, verified, verified_ts, flash_error, \
                                project_id, vin_error";

pub struct EcuScanRepository {
    pool: PgPool,
}

impl EcuScanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a batch of scan results, skipping the ones that conflict
    ///
    /// Rows that duplicate an existing (project, vin, filename, ecu) scan, or
    /// that point at a project which does not exist, are left out and reported
    /// in [`IngestReport::rejected`]; the rest are inserted in one statement.
    /// Rows are applied in input order, so within a batch the first of two
    /// duplicates is the one stored.
    pub async fn insert_batch(&self, scans: &[CreateEcuScan]) -> Result<IngestReport> {
        if scans.is_empty() {
            return Ok(IngestReport::default());
        }

        let ids: Vec<Uuid> = scans.iter().map(|_| Uuid::new_v4()).collect();
        let mut ecu_names = Vec::with_capacity(scans.len());
        let mut vins = Vec::with_capacity(scans.len());
        let mut signs_found = Vec::with_capacity(scans.len());
        let mut signs_ref = Vec::with_capacity(scans.len());
        let mut filenames = Vec::with_capacity(scans.len());
        let mut statuses = Vec::with_capacity(scans.len());
        let mut verified = Vec::with_capacity(scans.len());
        let mut verified_ts = Vec::with_capacity(scans.len());
        let mut flash_errors = Vec::with_capacity(scans.len());
        let mut project_ids = Vec::with_capacity(scans.len());
        let mut vin_errors = Vec::with_capacity(scans.len());

        for scan in scans {
            ecu_names.push(scan.ecu_name.clone());
            vins.push(scan.vin.clone());
            signs_found.push(scan.sign_found.clone());
            signs_ref.push(scan.sign_ref.clone());
            filenames.push(scan.filename.clone());
            statuses.push(scan.verified_status.as_str().to_string());
            verified.push(scan.verified);
            verified_ts.push(scan.verified_ts);
            flash_errors.push(scan.flash_error.clone());
            project_ids.push(scan.project_id);
            vin_errors.push(scan.vin_error.clone());
        }

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO ecu_scan (
                id, ecu_name, vin, sign_found, sign_ref, filename,
                verified_status, verified, verified_ts, flash_error,
                project_id, vin_error
            )
            SELECT s.id, s.ecu_name, s.vin, s.sign_found, s.sign_ref, s.filename,
                   s.verified_status, s.verified, s.verified_ts, s.flash_error,
                   s.project_id, s.vin_error
            FROM UNNEST(
                $1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[],
                $7::text[], $8::bool[], $9::timestamptz[], $10::text[],
                $11::uuid[], $12::text[]
            ) WITH ORDINALITY AS s (
                id, ecu_name, vin, sign_found, sign_ref, filename,
                verified_status, verified, verified_ts, flash_error,
                project_id, vin_error, ord
            )
            WHERE EXISTS (SELECT 1 FROM projects p WHERE p.id = s.project_id)
            ORDER BY s.ord
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&ids)
        .bind(&ecu_names)
        .bind(&vins)
        .bind(&signs_found)
        .bind(&signs_ref)
        .bind(&filenames)
        .bind(&statuses)
        .bind(&verified)
        .bind(&verified_ts)
        .bind(&flash_errors)
        .bind(&project_ids)
        .bind(&vin_errors)
        .fetch_all(&self.pool)
        .await?;

        let inserted: HashSet<Uuid> = inserted.into_iter().collect();
        let rejected: Vec<RejectedScan> = ids
            .iter()
            .zip(scans)
            .filter(|(id, _)| !inserted.contains(id))
            .map(|(_, scan)| {
                tracing::warn!(
                    filename = %scan.filename,
                    vin = %scan.vin,
                    ecu_name = %scan.ecu_name,
                    project_id = %scan.project_id,
                    "Skipped conflicting scan result"
                );
                RejectedScan {
                    filename: scan.filename.clone(),
                    vin: scan.vin.clone(),
                    ecu_name: scan.ecu_name.clone(),
                }
            })
            .collect();

        tracing::debug!(
            inserted = inserted.len(),
            rejected = rejected.len(),
            "Stored scan results"
        );

        Ok(IngestReport {
            inserted: inserted.len(),
            rejected,
        })
    }

    /// Get the most recently verified scan of a project
    pub async fn latest_for_project(&self, project_id: Uuid) -> Result<Option<EcuScanRecord>> {
        let record = sqlx::query_as::<_, EcuScanRecord>(&format!(
            r#"
            SELECT {ECU_SCAN_COLUMNS}
            FROM ecu_scan
            WHERE project_id = $1
            ORDER BY verified_ts DESC
            LIMIT 1
            "#
        ))
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// List all scans of a project, oldest first
    pub async fn list_for_project(&self, project_id: Uuid) -> Result<Vec<EcuScanRecord>> {
        let records = sqlx::query_as::<_, EcuScanRecord>(&format!(
            r#"
            SELECT {ECU_SCAN_COLUMNS}
            FROM ecu_scan
            WHERE project_id = $1
            ORDER BY verified_ts, vin, ecu_name
            "#
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_verified_status_round_trips_known_values() {
        assert_eq!(VerifiedStatus::from("OK".to_string()), VerifiedStatus::Ok);
        assert_eq!(VerifiedStatus::from("Fail".to_string()), VerifiedStatus::Fail);
        assert_eq!(VerifiedStatus::Ok.as_str(), "OK");
        assert_eq!(VerifiedStatus::Fail.as_str(), "Fail");
    }

    #[test]
    fn test_verified_status_keeps_unknown_values() {
        let status = VerifiedStatus::from("Not Found".to_string());
        assert_eq!(status, VerifiedStatus::Other("Not Found".to_string()));
        assert_eq!(status.as_str(), "Not Found");
        // Case matters: the report queries compare against 'OK' and 'Fail'
        assert_eq!(
            VerifiedStatus::from("ok".to_string()),
            VerifiedStatus::Other("ok".to_string())
        );
    }

    #[test]
    fn test_scan_payload_defaults_error_fields() {
        let scan: CreateEcuScan = serde_json::from_value(serde_json::json!({
            "ecu_name": "BCM",
            "vin": "WVWZZZ1JZXW000001",
            "sign_found": "A1",
            "sign_ref": "A1",
            "filename": "scan_001.csv",
            "verified_status": "OK",
            "verified": true,
            "verified_ts": "2024-03-01T08:00:00Z",
            "project_id": "67e55044-10b1-426f-9247-bb680e5fe0c8"
        }))
        .unwrap();

        assert_eq!(scan.verified_status, VerifiedStatus::Ok);
        assert_eq!(scan.flash_error, "");
        assert_eq!(scan.vin_error, "");
    }
}
