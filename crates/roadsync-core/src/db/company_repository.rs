//! Company repository implementation

use libsql::Connection;

use crate::error::Result;
use crate::models::{Company, CompanyId};

/// Trait for company lookup operations (async)
#[allow(async_fn_in_trait)]
pub trait CompanyRepository {
    /// Get a company by id
    async fn get(&self, id: CompanyId) -> Result<Option<Company>>;

    /// Find a company by name (case-insensitive)
    async fn find_by_name(&self, name: &str) -> Result<Option<Company>>;

    /// Find a company by name, creating it when absent
    async fn get_or_create(&self, name: &str) -> Result<Company>;
}

/// libSQL implementation of `CompanyRepository`
pub struct LibSqlCompanyRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCompanyRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CompanyRepository for LibSqlCompanyRepository<'_> {
    async fn get(&self, id: CompanyId) -> Result<Option<Company>> {
        let mut rows = self
            .conn
            .query("SELECT id, name FROM companies WHERE id = ?", [id.0])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Company {
                id: CompanyId(row.get(0)?),
                name: row.get(1)?,
            })),
            None => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Company>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name FROM companies WHERE name = ? COLLATE NOCASE",
                [name],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Company {
                id: CompanyId(row.get(0)?),
                name: row.get(1)?,
            })),
            None => Ok(None),
        }
    }

    async fn get_or_create(&self, name: &str) -> Result<Company> {
        if let Some(existing) = self.find_by_name(name).await? {
            return Ok(existing);
        }

        self.conn
            .execute("INSERT INTO companies (name) VALUES (?)", [name])
            .await?;

        Ok(Company {
            id: CompanyId(self.conn.last_insert_rowid()),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_or_create_reuses_case_insensitive_match() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlCompanyRepository::new(db.connection());

        let created = repo.get_or_create("Colas Madagascar").await.unwrap();
        let reused = repo.get_or_create("COLAS MADAGASCAR").await.unwrap();

        assert_eq!(created.id, reused.id);
        // The stored spelling is the first one seen.
        assert_eq!(reused.name, "Colas Madagascar");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_by_name_missing() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlCompanyRepository::new(db.connection());

        assert!(repo.find_by_name("Inconnu").await.unwrap().is_none());
    }
}
