//! Error types for vesselmap.
//!
//! This module defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

use crate::field::Field;

/// Result type alias using [`MapError`].
pub type Result<T> = std::result::Result<T, MapError>;

/// Errors that can occur during mapping and patching operations.
#[derive(Error, Debug)]
pub enum MapError {
    /// An input surface or centerline is empty or structurally unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required named field is absent from an attribute set.
    #[error("required field '{field}' is missing from {location} data")]
    MissingField {
        /// The field that was looked up.
        field: Field,
        /// Where the lookup happened ("point" or "cell").
        location: &'static str,
    },

    /// A named field exists but holds a different array type than requested.
    #[error("field '{field}' holds {actual} data, expected {expected}")]
    FieldType {
        /// The field that was looked up.
        field: Field,
        /// The array type actually stored.
        actual: &'static str,
        /// The array type the caller asked for.
        expected: &'static str,
    },

    /// An attribute array's length does not match its element count.
    #[error("field '{field}' has {len} entries for {expected} {location} elements")]
    FieldLength {
        /// The offending field.
        field: Field,
        /// Stored array length.
        len: usize,
        /// Expected element count.
        expected: usize,
        /// "point" or "cell".
        location: &'static str,
    },

    /// A triangle references a point index outside the point array.
    #[error("triangle {triangle} references invalid point index {point}")]
    InvalidPointIndex {
        /// The triangle index.
        triangle: usize,
        /// The invalid point index.
        point: usize,
    },

    /// Geometry unsuitable for the requested operation. Recoverable at
    /// branch granularity: the caller skips the branch and continues.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The iterative solver failed to converge.
    #[error("solver failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// The operation was cancelled through a [`CancelToken`](crate::algo::CancelToken).
    #[error("operation cancelled")]
    Cancelled,

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing an input file.
    #[error("failed to load {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error writing an output file.
    #[error("failed to save {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },
}

impl MapError {
    /// Missing point-data field.
    pub fn missing_point_field(field: Field) -> Self {
        MapError::MissingField {
            field,
            location: "point",
        }
    }

    /// Missing cell-data field.
    pub fn missing_cell_field(field: Field) -> Self {
        MapError::MissingField {
            field,
            location: "cell",
        }
    }

    /// True when the error is recoverable at branch granularity.
    pub fn is_branch_recoverable(&self) -> bool {
        matches!(
            self,
            MapError::DegenerateGeometry(_) | MapError::ConvergenceFailed { .. }
        )
    }
}
