//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: incidents, reference data, status ledger
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside a transaction for atomicity.

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Remediation companies (name is matched case-insensitively)
        "CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE
        )",
        // Reporting users
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'citizen'
        )",
        // Status code lookup: codes, display labels, progress percentages
        "CREATE TABLE IF NOT EXISTS status_codes (
            code TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            percentage INTEGER NOT NULL
        )",
        "INSERT OR IGNORE INTO status_codes (code, label, percentage) VALUES
            ('nouveau', 'Nouveau', 0),
            ('en_cours', 'En cours', 50),
            ('termine', 'Terminé', 100)",
        // Incidents; doc_id links to the document-store counterpart and
        // coord_key is the normalized duplicate-detection key. Both are
        // UNIQUE so a concurrent check-then-insert loses the race here
        // instead of producing duplicates.
        "CREATE TABLE IF NOT EXISTS incidents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id TEXT UNIQUE,
            surface REAL NOT NULL DEFAULT 0 CHECK (surface >= 0),
            budget REAL NOT NULL DEFAULT 0 CHECK (budget >= 0),
            latitude REAL NOT NULL DEFAULT 0,
            longitude REAL NOT NULL DEFAULT 0,
            coord_key TEXT UNIQUE,
            company_id INTEGER REFERENCES companies(id),
            user_id INTEGER REFERENCES users(id),
            created_at INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_incidents_company ON incidents(company_id)",
        // Append-only status ledger; rows are never updated or deleted
        "CREATE TABLE IF NOT EXISTS status_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            incident_id INTEGER NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
            status TEXT NOT NULL REFERENCES status_codes(code),
            recorded_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_status_log_incident
            ON status_log(incident_id, recorded_at DESC, id DESC)",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: status-change notifications
async fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            incident_id INTEGER NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            old_status TEXT NOT NULL REFERENCES status_codes(code),
            new_status TEXT NOT NULL REFERENCES status_codes(code),
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_notifications_unread
            ON notifications(user_id, is_read)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_status_codes_seeded() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT label, percentage FROM status_codes WHERE code = 'en_cours'",
                (),
            )
            .await
            .unwrap();

        let row = rows.next().await.unwrap().unwrap();
        let label: String = row.get(0).unwrap();
        let percentage: i64 = row.get(1).unwrap();
        assert_eq!(label, "En cours");
        assert_eq!(percentage, 50);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_coord_key_uniqueness_enforced() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        conn.execute(
            "INSERT INTO incidents (surface, budget, latitude, longitude, coord_key)
             VALUES (1, 1, -18.8792, 47.5079, '-18.87920:47.50790')",
            (),
        )
        .await
        .unwrap();

        let duplicate = conn
            .execute(
                "INSERT INTO incidents (surface, budget, latitude, longitude, coord_key)
                 VALUES (2, 2, -18.8792, 47.5079, '-18.87920:47.50790')",
                (),
            )
            .await;
        assert!(duplicate.is_err());
    }
}
