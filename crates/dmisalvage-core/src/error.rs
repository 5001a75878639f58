//! Error types for the dmisalvage-core library.
//!
//! This module provides error handling using the `thiserror` crate. The
//! distinction that matters to the resolver is [`Error::is_recoverable`]:
//! recoverable errors are absorbed as a single tier's failure and trigger
//! fallback to the next tier, while the rest describe an invalid request and
//! abort resolution outright.

use thiserror::Error;

/// Result type alias for dmisalvage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all dmisalvage operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A hex text token contained a non-hexadecimal digit
    #[error("invalid hex token '{token}': not a hexadecimal byte value")]
    InvalidHexToken {
        /// The offending token
        token: String,
    },

    /// Hex text did not contain a whole number of bytes
    #[error("hex text holds {count} nibbles: cannot form a whole number of bytes")]
    OddNibbleCount {
        /// Total number of valid nibbles found
        count: usize,
    },

    /// A section name not present in the section table
    #[error("unknown section '{name}'")]
    UnknownSection {
        /// The rejected section name
        name: String,
    },

    /// A structure table ended before its declared contents
    #[error("truncated structure table at offset {offset}: {details}")]
    TruncatedTable {
        /// Byte offset where the walk stopped
        offset: usize,
        /// Description of what was missing
        details: String,
    },

    /// A structure source failed to produce its view
    #[error("structure source failed: {0}")]
    Source(String),

    /// JSON rendering failed
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new invalid hex token error
    pub fn invalid_hex_token(token: impl Into<String>) -> Self {
        Self::InvalidHexToken {
            token: token.into(),
        }
    }

    /// Creates a new odd nibble count error
    pub fn odd_nibble_count(count: usize) -> Self {
        Self::OddNibbleCount { count }
    }

    /// Creates a new unknown section error
    pub fn unknown_section(name: impl Into<String>) -> Self {
        Self::UnknownSection { name: name.into() }
    }

    /// Creates a new truncated table error
    pub fn truncated_table(offset: usize, details: impl Into<String>) -> Self {
        Self::TruncatedTable {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new source failure error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Returns true if this error only invalidates one resolution tier.
    ///
    /// Recoverable errors describe data a tier could not make sense of; the
    /// resolver swallows them and falls through to the next tier. Everything
    /// else describes a request that no tier can satisfy.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Source(_)
                | Self::TruncatedTable { .. }
                | Self::InvalidHexToken { .. }
                | Self::OddNibbleCount { .. }
        )
    }
}
