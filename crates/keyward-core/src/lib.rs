//! # Keyward Core
//!
//! Core utilities, configuration management, logging, and filesystem
//! helpers shared by the keyward crates.
//!
//! This crate provides:
//!
//! - **Configuration**: Layered tool settings (default, file, set, environment)
//! - **Logging**: `tracing` subscriber setup for terminal and file outputs
//! - **Security parameters**: Loading and saving `security.yml`
//! - **Process Execution**: Command execution with interrupted-wait retry
//!   and stdin password feeding
//! - **File Operations**: Owner-only permissions, hardened copies, YAML helpers
//! - **Client configuration**: The `client.security` properties file
//!
//! ## Example
//!
//! ```no_run
//! use keyward_core::{log, params, config::ToolSettings};
//!
//! log::init_default()?;
//!
//! let settings = ToolSettings::load()?;
//! let params = params::load_security_params("/var/kvroot/security")?;
//! println!("keystore type: {}", params.keystore_type);
//! # Ok::<(), keyward_types::KeywardError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client_security;
pub mod config;
pub mod log;
pub mod params;
pub mod util;

// Re-export commonly used items
pub use config::{Config, ToolSettings};
pub use keyward_types::{KeywardError, Result};

/// Keyward application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Keyward application name
pub const APP_NAME: &str = "keyward";
