//! Relational store layer for roadsync

mod company_repository;
mod connection;
mod incident_repository;
mod ledger_repository;
mod migrations;
mod notification_repository;
pub mod stats;
mod user_repository;

pub use company_repository::{CompanyRepository, LibSqlCompanyRepository};
pub use connection::Database;
pub use incident_repository::{IncidentRepository, LibSqlIncidentRepository, SyncedFields};
pub use ledger_repository::{LedgerRepository, LibSqlLedgerRepository};
pub use notification_repository::{LibSqlNotificationRepository, NotificationRepository};
pub use user_repository::{LibSqlUserRepository, UserRepository};
