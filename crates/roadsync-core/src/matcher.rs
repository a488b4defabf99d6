//! Entity matcher: duplicate detection across stores keyed on coordinates.
//!
//! Records created independently in the two stores are considered the same
//! logical incident when their geographic positions agree. Raw floating
//! point equality is too fragile for that (representation drift between
//! stores produces false negatives), so both sides are reduced to a
//! normalized fixed-precision key before comparison.

use crate::error::{Error, Result};

/// Decimal places kept when normalizing coordinates (~1 m at the equator).
const COORDINATE_PRECISION: usize = 5;

/// 10^COORDINATE_PRECISION, for rounding before formatting.
const COORDINATE_SCALE: f64 = 100_000.0;

/// Round to the key precision, collapsing negative zero so positions
/// straddling an axis within rounding distance share a key.
fn round_coordinate(value: f64) -> f64 {
    let rounded = (value * COORDINATE_SCALE).round() / COORDINATE_SCALE;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Normalized duplicate-detection key for a geographic position.
///
/// Returns `None` when the position is unset: zero coordinates (the
/// stores' default for missing data) or non-finite values. Records without
/// a key are never matched by position, only by an explicit cross-store
/// link.
#[must_use]
pub fn coordinate_key(latitude: f64, longitude: f64) -> Option<String> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if latitude == 0.0 && longitude == 0.0 {
        return None;
    }
    let latitude = round_coordinate(latitude);
    let longitude = round_coordinate(longitude);
    Some(format!(
        "{latitude:.prec$}:{longitude:.prec$}",
        prec = COORDINATE_PRECISION
    ))
}

/// Find the counterpart of a candidate position among target records.
///
/// `key_of` extracts the normalized coordinate key of a target record.
/// Side-effect free. Returns `Ok(None)` when nothing matches, the single
/// match otherwise, and [`Error::DuplicateAmbiguity`] when more than one
/// target record shares the candidate's key — ambiguity is surfaced for
/// manual review, never resolved by silently picking one.
pub fn find_counterpart<'a, T>(
    latitude: f64,
    longitude: f64,
    targets: &'a [T],
    key_of: impl Fn(&T) -> Option<String>,
) -> Result<Option<&'a T>> {
    let Some(candidate_key) = coordinate_key(latitude, longitude) else {
        return Ok(None);
    };

    let mut matches = targets
        .iter()
        .filter(|target| key_of(target).as_deref() == Some(candidate_key.as_str()));

    let Some(first) = matches.next() else {
        return Ok(None);
    };

    let extra = matches.count();
    if extra > 0 {
        return Err(Error::DuplicateAmbiguity(extra + 1, candidate_key));
    }

    Ok(Some(first))
}
