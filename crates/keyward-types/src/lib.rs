//! # Keyward Types
//!
//! Core types, traits, and enums shared across all keyward crates.
//!
//! This crate provides the fundamental building blocks for managing the
//! security material of a store deployment, including:
//!
//! - The declarative security-parameters record kept in a security directory
//! - Store types and logical transports
//! - A password buffer that is wiped on every exit path
//! - Collaborator traits for the credential tool and the Kerberos admin utility
//! - Error types and result aliases
//!
//! ## Example
//!
//! ```
//! use keyward_types::{SecretBuffer, StoreType};
//!
//! let store_type: StoreType = "pkcs12".parse().unwrap();
//! assert_eq!(store_type.to_string(), "PKCS12");
//!
//! let mut password = SecretBuffer::from("changeit");
//! assert_eq!(password.expose(), "changeit");
//! password.wipe();
//! assert_eq!(password.expose(), "        ");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod enums;
pub mod files;
pub mod params;
pub mod secret;
pub mod traits;

// Re-export common types for convenience
pub use errors::{KeywardError, Result};
pub use enums::{AuthMethod, LogLevel, StoreType, Transport};
pub use params::{KerberosParams, ParamSetting, SecurityParams, TransportParams, Transports};
pub use secret::SecretBuffer;
pub use traits::{AdminUtility, CredentialTool, KeyPairRequest, PasswordPrompt, StoreHandle, ToolOutput};
