//! Error types for the weft-core crate.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    UnsupportedVersion(u8),
    TooShort { min: usize, actual: usize },
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::UnsupportedVersion(v) => {
                write!(f, "unsupported exchange header version: {v}")
            }
            HeaderError::TooShort { min, actual } => {
                write!(
                    f,
                    "message too short: need at least {min} bytes, got {actual}"
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HeaderError {}
