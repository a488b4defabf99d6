//! User repository implementation

use libsql::{Connection, Row};

use crate::error::{Error, Result};
use crate::models::{Role, User, UserId};

/// Trait for user lookup operations (async)
#[allow(async_fn_in_trait)]
pub trait UserRepository {
    /// Get a user by id
    async fn get(&self, id: UserId) -> Result<Option<User>>;

    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a new user
    async fn create(&self, email: &str, name: &str, role: Role) -> Result<User>;
}

/// libSQL implementation of `UserRepository`
pub struct LibSqlUserRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlUserRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_user(row: &Row) -> Result<User> {
        let role: String = row.get(3)?;
        Ok(User {
            id: UserId(row.get(0)?),
            email: row.get(1)?,
            name: row.get(2)?,
            role: parse_role(&role)?,
        })
    }
}

fn parse_role(value: &str) -> Result<Role> {
    match value {
        "manager" => Ok(Role::Manager),
        "citizen" => Ok(Role::Citizen),
        other => Err(Error::Database(format!("unknown role '{other}'"))),
    }
}

const fn role_code(role: Role) -> &'static str {
    match role {
        Role::Manager => "manager",
        Role::Citizen => "citizen",
    }
}

impl UserRepository for LibSqlUserRepository<'_> {
    async fn get(&self, id: UserId) -> Result<Option<User>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, email, name, role FROM users WHERE id = ?",
                [id.0],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, email, name, role FROM users WHERE email = ? COLLATE NOCASE",
                [email],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, email: &str, name: &str, role: Role) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users (email, name, role) VALUES (?, ?, ?)",
                (email, name, role_code(role)),
            )
            .await?;

        Ok(User {
            id: UserId(self.conn.last_insert_rowid()),
            email: email.to_string(),
            name: name.to_string(),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_find_by_email() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlUserRepository::new(db.connection());

        let user = repo
            .create("rakoto@example.mg", "Rakoto", Role::Citizen)
            .await
            .unwrap();

        let found = repo.find_by_email("RAKOTO@example.mg").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Citizen);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlUserRepository::new(db.connection());

        assert!(repo.get(UserId(42)).await.unwrap().is_none());
    }
}
