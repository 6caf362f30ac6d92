//! Error types for sugerir operations.
//!
//! Provides rich error context for library consumers.

use std::fmt;

/// Main error type for sugerir operations.
///
/// Covers persistence misconfiguration, corrupt model files, invalid
/// hyperparameters, and unsupported engine selections.
///
/// # Examples
///
/// ```
/// use sugerir::error::SugerirError;
///
/// let err = SugerirError::MalformedModel {
///     line: 3,
///     message: "expected <id>|<similarity>".to_string(),
/// };
/// assert!(err.to_string().contains("line 3"));
/// ```
#[derive(Debug)]
pub enum SugerirError {
    /// Persistence was requested but no model file path is configured.
    MissingModelPath,

    /// A model file did not conform to the line format.
    MalformedModel {
        /// 1-based line number of the offending line
        line: usize,
        /// Error description
        message: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// The method type / algorithm pair selects no engine.
    UnsupportedAlgorithm {
        /// Method type axis value
        method: String,
        /// Algorithm axis value
        algorithm: String,
    },

    /// Matrix decomposition failed or produced unusable output.
    Decomposition(String),

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error.
    Serialization(String),
}

impl fmt::Display for SugerirError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SugerirError::MissingModelPath => {
                write!(f, "No model file path configured for persistence")
            }
            SugerirError::MalformedModel { line, message } => {
                write!(f, "Malformed model file at line {line}: {message}")
            }
            SugerirError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            SugerirError::UnsupportedAlgorithm { method, algorithm } => {
                write!(
                    f,
                    "Unsupported engine selection: {method} does not provide {algorithm}"
                )
            }
            SugerirError::Decomposition(msg) => write!(f, "Decomposition failed: {msg}"),
            SugerirError::Io(e) => write!(f, "I/O error: {e}"),
            SugerirError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for SugerirError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SugerirError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SugerirError {
    fn from(err: std::io::Error) -> Self {
        SugerirError::Io(err)
    }
}

/// Result type alias for sugerir operations.
pub type Result<T> = std::result::Result<T, SugerirError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_failure() {
        let err = SugerirError::MissingModelPath;
        assert!(err.to_string().contains("No model file path"));

        let err = SugerirError::UnsupportedAlgorithm {
            method: "memory_based".to_string(),
            algorithm: "svd_incremental".to_string(),
        };
        assert!(err.to_string().contains("memory_based"));
        assert!(err.to_string().contains("svd_incremental"));
    }

    #[test]
    fn io_errors_convert_and_expose_source() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SugerirError = io.into();
        assert!(err.source().is_some());
    }
}
