//! Error taxonomy for catalog construction, lookup, and projection.
//!
//! Only genuinely fatal conditions become errors. Degenerate astrometry
//! (non-finite proper motions, low-significance parallaxes) and oversized
//! affine-fit residuals are substituted with sentinels and reported through
//! `tracing` instead; see [`crate::catalog::Catalog::at_epoch`] and
//! [`crate::field::Field::fit_pixel_affine`].

use thiserror::Error;

/// Errors produced by catalog and field operations.
///
/// Collaborator failures (name resolution, file I/O) propagate through here
/// unchanged; nothing is retried internally.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A name could not be resolved to a sky position, either because the
    /// external resolver rejected it or because a deferred center was used
    /// before being resolved.
    #[error("unable to resolve '{name}' to a sky position")]
    NameResolution { name: String },

    /// Mismatched array lengths when assembling a table.
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    ShapeMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// A required column is absent from a raw archive table, or an optional
    /// column was supplied without its required companion.
    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    /// An identifier-based or positional lookup missed.
    #[error("no entry found for '{id}'")]
    NotFound { id: String },

    /// The primary identifier column contains a repeated value.
    #[error("duplicate identifier '{id}' in primary key column")]
    DuplicateId { id: String },

    /// A projection or affine operation was attempted without a usable
    /// tangent point (all-sky field) or with a singular transform.
    #[error("field has no usable tangent point or transform: {reason}")]
    DegenerateField { reason: String },

    /// File I/O failure during serialization; surfaced verbatim.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed content while reading a serialized catalog.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CatalogError>;
