//! Errors raised by the annotation geometry core.

use thiserror::Error;

/// Failure of a single annotation record or shape.
///
/// Both variants are local to the record or shape that produced them; callers
/// skip the offending item and continue with the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required field is missing or carries an unusable value.
    #[error("invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// Geometry that cannot define a box or contour.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
