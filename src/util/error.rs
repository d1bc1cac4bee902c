//! Error types for the FBOM library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for FBOM operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of stream
    #[error("Invalid FBOM stream: expected FBOM magic bytes")]
    InvalidMagic,

    /// Unsupported format version
    #[error("Unsupported FBOM version: {0}")]
    UnsupportedVersion(u16),

    /// Invalid endianness marker in header
    #[error("Invalid endianness marker: {0:#04x}")]
    InvalidEndianness(u8),

    /// Stream is truncated or corrupted
    #[error("Unexpected end of stream at position {0}")]
    UnexpectedEof(u64),

    /// Unknown command byte in the token stream
    #[error("Invalid command byte {byte:#04x} at position {pos}")]
    InvalidCommand { byte: u8, pos: u64 },

    /// Invalid data structure in stream
    #[error("Invalid stream structure: {0}")]
    InvalidStructure(String),

    /// Type mismatch when reading data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Supplied byte count does not match the type's declared size
    #[error("Size mismatch: type declares {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Static data index out of bounds
    #[error("Static data index {index} out of bounds (count: {count})")]
    StaticDataOutOfRange { index: usize, count: usize },

    /// Static data entry kind differs from the requested kind
    #[error("Static data kind mismatch at index {index}: expected {expected}, got {actual}")]
    StaticDataKindMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// No marshal registered for a native type
    #[error("No registered marshal for type: {0}")]
    NoMarshalRegistered(String),

    /// External object reference could not be resolved
    #[error("External object not available: library {library:#018x}, index {index}")]
    ExternalObjectUnavailable { library: u64, index: u32 },

    /// Deserialized value had an unexpected concrete type
    #[error("Downcast failed: expected {0}")]
    Downcast(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a type mismatch error from two type descriptions.
    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type alias for FBOM operations.
pub type Result<T> = std::result::Result<T, Error>;
