//! # Keyward Secrets
//!
//! Key and trust store lifecycle for a security directory.
//!
//! Provides:
//! - Random store and user password generation
//! - Native PKCS12 and JKS store codecs, plus certificate helpers
//! - Credential tool backends (in-process or the `keytool` subprocess)
//! - Store creation, type migration and client truststore derivation
//! - Merging trusted certificates between security directories
//! - Consistency checks over transport settings and installed stores

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod generator;
pub mod keystore;
pub mod lifecycle;
pub mod merge;
pub mod tool;
pub mod verifier;

pub use generator::{passwords_match, SecretGenerator};
pub use keystore::{KeyStore, KeyStoreAccess, StoreEntry};
pub use lifecycle::{ClientTrust, KeyStoreOptions, StoreLifecycleManager};
pub use merge::TrustMerger;
pub use tool::{CredentialToolBackend, Keytool, NativeCredentialTool};
pub use verifier::ConfigVerifier;
