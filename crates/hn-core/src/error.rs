//! # ArchiveError
//!
//! Centralized error handling for the HyperNews archive store.
//! Both backends classify failures with these variants so callers can
//! tell a missing record from a broken one from a failing disk.

use std::path::PathBuf;

use thiserror::Error;

use crate::enums::RecordKind;

/// The primary error type for all hn-core operations.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No record at the requested address (e.g., Forum, Message, Person)
    #[error("{kind} not found at {address}")]
    NotFound { kind: RecordKind, address: String },

    /// The address itself cannot name a record (e.g., empty or non-numeric path)
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A required field is absent from the record
    #[error("{field} missing in {source_path} for {kind}")]
    MissingField {
        field: &'static str,
        kind: RecordKind,
        source_path: String,
    },

    /// An enumerated field carries a token outside its table
    #[error("unrecognized {field} value {value:?} in {source_path} for {kind}")]
    UnrecognizedValue {
        field: &'static str,
        value: String,
        kind: RecordKind,
        source_path: String,
    },

    /// A field could not be converted (e.g., non-numeric integer, unknown date format)
    #[error("invalid {field} value {value:?} in {source_path} for {kind}")]
    InvalidValue {
        field: &'static str,
        value: String,
        kind: RecordKind,
        source_path: String,
    },

    /// Infrastructure failure on the archive files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Infrastructure failure in the embedded database
    #[error("database error: {0}")]
    Database(String),

    /// The index builder refuses to replace an existing database
    #[error("index already exists at {}", .0.display())]
    IndexExists(PathBuf),
}

impl ArchiveError {
    pub fn not_found(kind: RecordKind, address: impl Into<String>) -> Self {
        ArchiveError::NotFound {
            kind,
            address: address.into(),
        }
    }

    /// True for the record-content failures that bulk listings skip over.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ArchiveError::MissingField { .. }
                | ArchiveError::UnrecognizedValue { .. }
                | ArchiveError::InvalidValue { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound { .. })
    }
}

/// A specialized Result type for archive logic.
pub type Result<T> = std::result::Result<T, ArchiveError>;
