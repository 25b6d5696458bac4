//! Collaborator traits for the external tools keyward drives.
//!
//! Certificate generation and store conversion are delegated to a
//! [`CredentialTool`]; Kerberos principal administration to an
//! [`AdminUtility`]. Both report failures as a non-zero exit code plus the
//! captured output, the way the command-line tools they model do.

use std::path::{Path, PathBuf};
use crate::errors::{KeywardError, Result};
use crate::{SecretBuffer, StoreType};

/// Exit code and captured output lines of a collaborator invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; zero means success
    pub code: i32,
    /// Captured output lines (stdout and stderr merged)
    pub output: Vec<String>,
}

impl ToolOutput {
    /// A successful invocation with the given output.
    pub fn ok(output: Vec<String>) -> Self {
        Self { code: 0, output }
    }

    /// A failed invocation.
    pub fn failed(code: i32, output: Vec<String>) -> Self {
        Self { code, output }
    }

    /// Whether the invocation exited with code zero.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Convert a non-zero exit into a tool error describing `what` failed.
    pub fn check(self, tool: &str, what: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(KeywardError::tool(tool, self.code, what, &self.output))
        }
    }
}

/// A key or trust store on disk: path, declared type, and password.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    /// Store file
    pub path: PathBuf,
    /// Declared store type
    pub store_type: StoreType,
    /// Store password; absent only for password-less PKCS12
    pub password: Option<SecretBuffer>,
}

impl StoreHandle {
    /// Describe a store, rejecting a JKS store without a password.
    pub fn new(
        path: impl AsRef<Path>,
        store_type: StoreType,
        password: Option<SecretBuffer>,
    ) -> Result<Self> {
        if store_type == StoreType::Jks && password.as_ref().map_or(true, |p| p.is_empty()) {
            return Err(KeywardError::Validation(format!(
                "JKS store {} requires a password",
                path.as_ref().display()
            )));
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            store_type,
            password,
        })
    }

    /// Whether the store is written without a password.
    pub fn is_passwordless(&self) -> bool {
        self.store_type.is_passwordless(self.password.as_ref())
    }
}

/// Parameters of a key pair plus self-signed certificate to generate.
#[derive(Debug, Clone)]
pub struct KeyPairRequest {
    /// Keystore receiving the new private-key entry
    pub store: StoreHandle,
    /// Entry alias
    pub alias: String,
    /// Distinguished name of the certificate subject and issuer
    pub dname: String,
    /// Key algorithm, `RSA` or `EC`
    pub key_algorithm: String,
    /// Key size in bits
    pub key_size: u32,
    /// Certificate validity in days
    pub validity_days: u32,
}

/// A tool that creates key pairs and moves certificates between stores.
///
/// Every operation returns the tool's exit status; implementations only
/// return `Err` when the tool could not be run at all.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait CredentialTool {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Generate a key pair and self-signed certificate under a new alias.
    fn generate_key_pair(&self, request: &KeyPairRequest) -> Result<ToolOutput>;

    /// Export the certificate of `alias` to a DER file.
    fn export_certificate(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<ToolOutput>;

    /// Import a certificate file as a trusted entry under `alias`.
    ///
    /// The store is created if it does not exist.
    fn import_certificate(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<ToolOutput>;

    /// Convert every entry of `source` into `dest`.
    ///
    /// When both name the same file the source is kept as `<file>.old`.
    fn migrate_store(&self, source: &StoreHandle, dest: &StoreHandle) -> Result<ToolOutput>;

    /// List the entries of a store in human-readable form.
    fn list_entries(&self, store: &StoreHandle) -> Result<ToolOutput>;
}

/// A Kerberos administration utility driven by command vectors.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait AdminUtility {
    /// Run one admin command; `password` is fed to the utility's prompt.
    fn run(&self, args: &[String], password: Option<SecretBuffer>) -> Result<ToolOutput>;
}

/// Source of interactively entered passwords.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait PasswordPrompt {
    /// Read a password without echo; `None` when nothing was entered.
    fn read_password(&self, prompt: &str) -> Result<Option<SecretBuffer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jks_requires_password() {
        assert!(StoreHandle::new("store.keys", StoreType::Jks, None).is_err());
        assert!(StoreHandle::new("store.keys", StoreType::Jks, Some("".into())).is_err());
        assert!(StoreHandle::new("store.keys", StoreType::Jks, Some("secret".into())).is_ok());
        let handle = StoreHandle::new("client.trust", StoreType::Pkcs12, None).unwrap();
        assert!(handle.is_passwordless());
    }

    #[test]
    fn test_check_maps_exit_code() {
        assert!(ToolOutput::ok(vec![]).check("keytool", "list").is_ok());
        let err = ToolOutput::failed(2, vec!["boom".into()])
            .check("keytool", "Error listing store")
            .unwrap_err();
        assert!(matches!(err, KeywardError::Tool { code: 2, .. }));
    }
}
