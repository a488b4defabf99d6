//! Aggregate statistics over the ledger-joined incident set
//!
//! All aggregates derive the current status per incident the same way the
//! ledger does (max timestamp, ties broken by max entry id, implicit
//! `nouveau` without entries), so counts always agree with what the
//! progress reads report.

use libsql::{Connection, Row};

use crate::db::incident_repository::opt_i64;
use crate::error::Result;

/// Shared CTE deriving each incident's current status and completion time.
const CURRENT_STATUS_CTE: &str = "WITH current AS (
    SELECT i.id AS incident_id,
           i.company_id,
           i.created_at,
           COALESCE(
               (SELECT s.status FROM status_log s
                WHERE s.incident_id = i.id
                ORDER BY s.recorded_at DESC, s.id DESC
                LIMIT 1),
               'nouveau') AS status,
           (SELECT s.recorded_at FROM status_log s
            WHERE s.incident_id = i.id
            ORDER BY s.recorded_at DESC, s.id DESC
            LIMIT 1) AS last_recorded_at
    FROM incidents i
)";

/// Aggregate counts and completion metrics over all incidents.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Total number of incidents
    pub total: u64,
    /// Incidents currently `nouveau`
    pub nouveau: u64,
    /// Incidents currently `en_cours`
    pub en_cours: u64,
    /// Incidents currently `termine`
    pub termine: u64,
    /// Fraction of incidents completed (0 when there are none)
    pub completion_rate: f64,
    /// Mean completion time in ms over completed incidents with a known
    /// creation timestamp
    pub avg_completion_ms: Option<f64>,
    /// Fastest completion time in ms
    pub min_completion_ms: Option<i64>,
    /// Slowest completion time in ms
    pub max_completion_ms: Option<i64>,
}

/// Per-company aggregate over assigned incidents.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyStatistics {
    /// Company display name
    pub company: String,
    /// Incidents assigned to the company
    pub total: u64,
    /// Assigned incidents currently `termine`
    pub termine: u64,
    /// Fraction of assigned incidents completed
    pub completion_rate: f64,
    /// Mean completion time in ms for the company's completed incidents
    pub avg_completion_ms: Option<f64>,
}

/// Compute global aggregate statistics.
pub async fn aggregate(conn: &Connection) -> Result<Statistics> {
    let sql = format!(
        "{CURRENT_STATUS_CTE}
         SELECT COUNT(*),
                SUM(status = 'nouveau'),
                SUM(status = 'en_cours'),
                SUM(status = 'termine'),
                AVG(CASE WHEN status = 'termine' AND created_at IS NOT NULL
                         THEN last_recorded_at - created_at END),
                MIN(CASE WHEN status = 'termine' AND created_at IS NOT NULL
                         THEN last_recorded_at - created_at END),
                MAX(CASE WHEN status = 'termine' AND created_at IS NOT NULL
                         THEN last_recorded_at - created_at END)
         FROM current"
    );

    let mut rows = conn.query(&sql, ()).await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| crate::Error::Database("empty aggregate result".to_string()))?;

    let total = count_at(&row, 0)?;
    let termine = count_at(&row, 3)?;
    #[allow(clippy::cast_precision_loss)]
    let completion_rate = if total == 0 {
        0.0
    } else {
        termine as f64 / total as f64
    };

    Ok(Statistics {
        total,
        nouveau: count_at(&row, 1)?,
        en_cours: count_at(&row, 2)?,
        termine,
        completion_rate,
        avg_completion_ms: opt_f64(&row, 4)?,
        min_completion_ms: opt_i64(&row, 5)?,
        max_completion_ms: opt_i64(&row, 6)?,
    })
}

/// Compute per-company aggregate statistics.
pub async fn by_company(conn: &Connection) -> Result<Vec<CompanyStatistics>> {
    let sql = format!(
        "{CURRENT_STATUS_CTE}
         SELECT c.name,
                COUNT(cur.incident_id),
                SUM(cur.status = 'termine'),
                AVG(CASE WHEN cur.status = 'termine' AND cur.created_at IS NOT NULL
                         THEN cur.last_recorded_at - cur.created_at END)
         FROM companies c
         JOIN current cur ON cur.company_id = c.id
         GROUP BY c.id
         ORDER BY c.name ASC"
    );

    let mut rows = conn.query(&sql, ()).await?;
    let mut stats = Vec::new();
    while let Some(row) = rows.next().await? {
        let total = count_at(&row, 1)?;
        let termine = count_at(&row, 2)?;
        #[allow(clippy::cast_precision_loss)]
        let completion_rate = if total == 0 {
            0.0
        } else {
            termine as f64 / total as f64
        };
        stats.push(CompanyStatistics {
            company: row.get(0)?,
            total,
            termine,
            completion_rate,
            avg_completion_ms: opt_f64(&row, 3)?,
        });
    }
    Ok(stats)
}

/// Read a COUNT/SUM column, treating SQL NULL (empty SUM) as zero.
fn count_at(row: &Row, idx: i32) -> Result<u64> {
    let value = opt_i64(row, idx)?.unwrap_or(0);
    Ok(u64::try_from(value).unwrap_or(0))
}

/// Read a nullable REAL column (AVG result).
fn opt_f64(row: &Row, idx: i32) -> Result<Option<f64>> {
    match row.get_value(idx)? {
        libsql::Value::Null => Ok(None),
        libsql::Value::Real(value) => Ok(Some(value)),
        #[allow(clippy::cast_precision_loss)]
        libsql::Value::Integer(value) => Ok(Some(value as f64)),
        other => Err(crate::Error::Database(format!(
            "expected real or null at column {idx}, got {other:?}"
        ))),
    }
}
