//! Per-VIN flash statistics, computed on demand from `ecu_scan`

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// One report row per (filename, VIN) with at least one verified scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashStatsRecord {
    pub filename: String,
    /// The VIN
    pub id: String,
    /// Number of verified scans
    pub verified: i64,
    pub passed: i64,
    pub failed: i64,
    /// Comma-joined names of ECUs with status "Fail"
    pub failed_ecus: Option<String>,
    /// Failed ECUs that also reported a flash error
    pub incorrectly_flashed: Option<String>,
    /// The VIN's mismatch message, empty when the VIN matched
    pub vin_mismatch: Option<String>,
}

// Columns are read by position: keep the SELECT list of FLASH_STATS_QUERY in
// this exact order.
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for FlashStatsRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            filename: row.try_get(0)?,
            id: row.try_get(1)?,
            verified: row.try_get(2)?,
            passed: row.try_get(3)?,
            failed: row.try_get(4)?,
            failed_ecus: row.try_get(5)?,
            incorrectly_flashed: row.try_get(6)?,
            vin_mismatch: row.try_get(7)?,
        })
    }
}

const FLASH_STATS_QUERY: &str = r#"
    SELECT v.filename,
           v.vin AS id,
           v.verified,
           COALESCE(p.passed, 0) AS passed,
           COALESCE(f.failed, 0) AS failed,
           f_ecu.failed_ecus,
           if_ecu.incorrectly_flashed,
           vm.vin_mismatch
    FROM (
        SELECT filename, vin, COUNT(verified) AS verified
        FROM ecu_scan
        WHERE verified = TRUE AND project_id = $1
        GROUP BY filename, vin
    ) AS v
    LEFT OUTER JOIN (
        SELECT filename, vin, COUNT(verified) AS failed
        FROM ecu_scan
        WHERE verified = TRUE AND verified_status = 'Fail' AND project_id = $1
        GROUP BY filename, vin
    ) AS f ON v.filename = f.filename AND v.vin = f.vin
    LEFT OUTER JOIN (
        SELECT filename, vin, COUNT(verified) AS passed
        FROM ecu_scan
        WHERE verified = TRUE AND verified_status = 'OK' AND project_id = $1
        GROUP BY filename, vin
    ) AS p ON v.filename = p.filename AND v.vin = p.vin
    LEFT OUTER JOIN (
        SELECT filename, vin, STRING_AGG(ecu_name, ', ' ORDER BY ecu_name) AS failed_ecus
        FROM ecu_scan
        WHERE verified_status = 'Fail' AND project_id = $1
        GROUP BY filename, vin
    ) AS f_ecu ON v.filename = f_ecu.filename AND v.vin = f_ecu.vin
    LEFT OUTER JOIN (
        SELECT filename, vin, STRING_AGG(ecu_name, ', ' ORDER BY ecu_name) AS incorrectly_flashed
        FROM ecu_scan
        WHERE verified_status = 'Fail' AND flash_error <> '' AND project_id = $1
        GROUP BY filename, vin
    ) AS if_ecu ON v.filename = if_ecu.filename AND v.vin = if_ecu.vin
    LEFT OUTER JOIN (
        SELECT filename, vin, MAX(vin_error) AS vin_mismatch
        FROM ecu_scan
        WHERE project_id = $1
        GROUP BY filename, vin
    ) AS vm ON v.filename = vm.filename AND v.vin = vm.vin
    ORDER BY COALESCE(f.failed, 0) DESC,
             f_ecu.failed_ecus DESC NULLS LAST,
             v.vin,
             v.filename
"#;

pub struct FlashStatsRepository {
    pool: PgPool,
}

impl FlashStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the flash report of a project
    ///
    /// Sorted by failed count (descending), then by the failed-ECU list as a
    /// string (descending).
    pub async fn for_project(&self, project_id: Uuid) -> Result<Vec<FlashStatsRecord>> {
        let rows = sqlx::query_as::<_, FlashStatsRecord>(FLASH_STATS_QUERY)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(project_id = %project_id, rows = rows.len(), "Computed flash stats");

        Ok(rows)
    }
}
