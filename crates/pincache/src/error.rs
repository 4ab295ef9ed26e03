//! Error types for pincache

use std::fmt;
use std::io;

/// Result type alias for pincache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for configuration loading and consistency checks
///
/// Ordinary cache outcomes (a miss, a rejected insert, pinning an absent
/// key) are reported through return values, never through this type.
#[derive(Debug)]
pub enum Error {
    /// I/O error while reading a configuration file
    Io(io::Error),

    /// Malformed configuration
    Config(String),

    /// Internal structures disagree with each other
    Invariant(String),
}

impl Error {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Error::Invariant(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(msg) => write!(f, "Config error: {}", msg),
            Error::Invariant(msg) => write!(f, "Invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invariant("recency chain length 3 != 2");
        assert_eq!(err.to_string(), "Invariant violated: recency chain length 3 != 2");

        let err = Error::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Config error: missing field");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;

        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(Error::Config("x".into()).source().is_none());
    }
}
