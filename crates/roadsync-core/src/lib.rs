//! roadsync-core - Core library for roadsync
//!
//! This crate contains the shared models, the two store layers (relational
//! and document), the bidirectional sync engine, and the status-ledger
//! business logic used by all roadsync interfaces.

pub mod config;
pub mod db;
pub mod docstore;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod notify;
pub mod projection;
pub mod service;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Incident, IncidentId, Status};
