//! Domain models for roadsync

mod company;
mod incident;
mod notification;
mod status;
mod user;

pub use company::{Company, CompanyId};
pub use incident::{Incident, IncidentDraft, IncidentId};
pub use notification::{Notification, NotificationDraft};
pub use status::{Status, StatusEntry};
pub use user::{Role, User, UserId};
