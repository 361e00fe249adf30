use std::io;

use thiserror::Error;

use crate::ofp_header::OfpVersion;

/// Errors raised while building, packing or unpacking OpenFlow structures.
///
/// Nothing in this crate recovers from these internally; the message layer
/// above is expected to turn them into OpenFlow error replies.
#[derive(Debug, Error)]
pub enum OfpError {
    #[error("{what} is not available in OpenFlow version {version}")]
    BadVersion { version: OfpVersion, what: String },
    #[error("bad length for {what}: declared {declared}, expected {expected}")]
    BadLength {
        what: &'static str,
        declared: usize,
        expected: usize,
    },
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("prerequisite for {field} not met: {requires}")]
    BadPrerequisite { field: String, requires: String },
    #[error("index {index} out of range for collection of {len} item(s)")]
    OutOfRange { index: usize, len: usize },
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

impl OfpError {
    pub fn bad_version<S: Into<String>>(version: OfpVersion, what: S) -> OfpError {
        OfpError::BadVersion {
            version,
            what: what.into(),
        }
    }

    pub fn bad_length(what: &'static str, declared: usize, expected: usize) -> OfpError {
        OfpError::BadLength {
            what,
            declared,
            expected,
        }
    }

    /// True for the recoverable "field not set" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(*self, OfpError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, OfpError>;
