//! # Error Types
//!
//! One error enum for the whole crate. Geometric degeneracies are usually
//! absorbed where they are found (a surface simply reports no hit); the
//! variants here are the ones that cross module boundaries.

use thiserror::Error;

/// Errors raised by mesh loading, table loading, ray traversal and configuration
#[derive(Error, Debug)]
pub enum RadError {
    /// A primitive was built from too few or coincident points
    #[error("degenerate geometry: {what}")]
    GeometryDegenerate { what: String },

    /// Face/zone topology is inconsistent for the current time step
    #[error("mesh integrity error at zone {zone}{}: {message}", face_suffix(.face))]
    MeshIntegrity {
        zone: usize,
        face: Option<usize>,
        message: String,
    },

    /// A material table is malformed or its grids are not monotonic
    #[error("table format error in '{table}': {message}")]
    TableFormat { table: String, message: String },

    /// Traversal looped or could not find an exit from a zone
    #[error("ray traversal error at zone {zone}{}: {message}", face_suffix(.face))]
    RayTraversal {
        zone: usize,
        face: Option<usize>,
        message: String,
    },

    /// Invalid run or trace configuration
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Malformed text input
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An index lookup fell outside its container
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn face_suffix(face: &Option<usize>) -> String {
    match face {
        Some(f) => format!(", face {}", f),
        None => String::new(),
    }
}

/// Result type for radsynth operations
pub type Result<T> = std::result::Result<T, RadError>;

impl RadError {
    pub fn degenerate(what: impl Into<String>) -> Self {
        RadError::GeometryDegenerate { what: what.into() }
    }

    pub fn mesh(zone: usize, face: Option<usize>, message: impl Into<String>) -> Self {
        RadError::MeshIntegrity {
            zone,
            face,
            message: message.into(),
        }
    }

    pub fn table(table: impl Into<String>, message: impl Into<String>) -> Self {
        RadError::TableFormat {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn traversal(zone: usize, face: Option<usize>, message: impl Into<String>) -> Self {
        RadError::RayTraversal {
            zone,
            face,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        RadError::Config {
            message: message.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        RadError::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        RadError::IndexOutOfRange { what, index, len }
    }

    /// True for errors that only invalidate a single ray
    pub fn is_traversal(&self) -> bool {
        matches!(self, RadError::RayTraversal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_ids() {
        let e = RadError::mesh(7, Some(2), "unmatched neighbor");
        let s = e.to_string();
        assert!(s.contains("zone 7"));
        assert!(s.contains("face 2"));

        let e = RadError::traversal(3, None, "no exit");
        assert_eq!(e.to_string(), "ray traversal error at zone 3: no exit");
        assert!(e.is_traversal());
    }

    #[test]
    fn test_table_error_names_table() {
        let e = RadError::table("Al", "temperature grid not increasing");
        assert!(e.to_string().contains("'Al'"));
        assert!(!e.is_traversal());
    }
}
