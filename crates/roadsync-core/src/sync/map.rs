//! Field mapping between the two store schemas
//!
//! Status codes differ textually between stores: the relational side keeps
//! machine codes (`en_cours`), the document side free text in its own
//! spelling (`"en cours"`, `"terminé"`). The mapper normalizes both ways.

use crate::error::{Error, Result};
use crate::models::Status;

/// Parse a document-side status text into the closed enumeration.
///
/// Tolerant of case, surrounding whitespace, and both spellings seen in
/// the wild (`"en cours"`/`"en_cours"`, `"terminé"`/`"termine"`).
pub fn status_from_document_text(text: &str) -> Result<Status> {
    match text.trim().to_lowercase().as_str() {
        "nouveau" => Ok(Status::Nouveau),
        "en cours" | "en_cours" => Ok(Status::EnCours),
        "terminé" | "termine" => Ok(Status::Termine),
        other => Err(Error::InvalidStatus {
            code: other.to_string(),
            valid: Status::valid_codes(),
        }),
    }
}

/// Document-side spelling for a status.
#[must_use]
pub const fn status_to_document_text(status: Status) -> &'static str {
    match status {
        Status::Nouveau => "nouveau",
        Status::EnCours => "en cours",
        Status::Termine => "terminé",
    }
}
