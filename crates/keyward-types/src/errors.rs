//! Error types for keyward operations.

use thiserror::Error;

/// The main error type for keyward operations.
///
/// The variants follow the failure taxonomy of the lifecycle operations:
/// policy violations are detected before anything destructive happens,
/// tool failures carry the collaborator's exit code and output, and I/O
/// failures come straight from the filesystem.
#[derive(Error, Debug)]
pub enum KeywardError {
    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A policy check refused the operation before any store was touched
    #[error("Policy violation: {0}")]
    Policy(String),

    /// Key or trust store could not be read, written, or inspected
    #[error("Store error: {0}")]
    Store(String),

    /// Certificate parsing or chain construction error
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// An external tool exited with a non-zero code
    #[error("{tool} failed with return code {code}: {message}")]
    Tool {
        /// Tool name (e.g. keytool, kadmin)
        tool: String,
        /// Exit code observed
        code: i32,
        /// What the tool was asked to do, plus any captured output
        message: String,
    },

    /// The store primitives do not support the requested operation
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Kerberos-related error
    #[error("Kerberos error: {0}")]
    Kerberos(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal bug - should never happen in production
    #[error("Bug detected: {0}\n\nThis is an internal error. Please report this issue at:\nhttps://github.com/keyward/keyward/issues")]
    Bug(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl KeywardError {
    /// Build a tool failure from an exit code and the captured output lines.
    pub fn tool(tool: impl Into<String>, code: i32, what: &str, output: &[String]) -> Self {
        let message = if output.is_empty() {
            what.to_string()
        } else {
            format!("{}\n{}", what, output.join("\n"))
        };
        KeywardError::Tool {
            tool: tool.into(),
            code,
            message,
        }
    }
}

/// A specialized Result type for keyward operations.
pub type Result<T> = std::result::Result<T, KeywardError>;

/// Helper macro to create and return a KeywardError::Bug
///
/// This should be used for conditions that should never occur
/// in normal operation and indicate a bug in keyward itself.
#[macro_export]
macro_rules! bug {
    ($msg:expr) => {
        return Err($crate::KeywardError::Bug($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::KeywardError::Bug(format!($fmt, $($arg)*)))
    };
}

/// Helper macro to bail out with a KeywardError
///
/// This is used for expected error conditions.
///
/// # Example
///
/// ```ignore
/// if backup.exists() {
///     bail!(Policy, "backup {} already exists", backup.display());
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($variant:ident, $msg:expr) => {
        return Err($crate::KeywardError::$variant($msg.to_string()))
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::KeywardError::$variant(format!($fmt, $($arg)*)))
    };
    ($msg:expr) => {
        return Err($crate::KeywardError::Other($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::KeywardError::Other(format!($fmt, $($arg)*)))
    };
}
