//! Credential tool backends.

pub mod keytool;
pub mod native;

use keyward_core::config::{CredentialToolKind, ToolSettings};
use keyward_types::{CredentialTool, KeyPairRequest, Result, StoreHandle, ToolOutput};
use std::path::Path;

pub use keytool::Keytool;
pub use native::NativeCredentialTool;

use crate::keystore::KeyStoreAccess;

/// The credential tool selected by the tool settings.
#[derive(Debug, Clone)]
pub enum CredentialToolBackend {
    /// In-process implementation
    Native(NativeCredentialTool),
    /// `keytool` subprocess
    Keytool(Keytool),
}

impl CredentialToolBackend {
    /// Build the backend named by `settings.credential_tool`.
    pub fn from_settings(settings: &ToolSettings) -> Self {
        match settings.credential_tool {
            CredentialToolKind::Native => {
                Self::Native(NativeCredentialTool::new(KeyStoreAccess::new(settings.passwordless_pkcs12)))
            }
            CredentialToolKind::Keytool => Self::Keytool(Keytool::new(settings.keytool_path.clone())),
        }
    }

    fn inner(&self) -> &dyn CredentialTool {
        match self {
            Self::Native(tool) => tool,
            Self::Keytool(tool) => tool,
        }
    }
}

impl CredentialTool for CredentialToolBackend {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn generate_key_pair(&self, request: &KeyPairRequest) -> Result<ToolOutput> {
        self.inner().generate_key_pair(request)
    }

    fn export_certificate(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<ToolOutput> {
        self.inner().export_certificate(store, alias, cert_file)
    }

    fn import_certificate(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<ToolOutput> {
        self.inner().import_certificate(store, alias, cert_file)
    }

    fn migrate_store(&self, source: &StoreHandle, dest: &StoreHandle) -> Result<ToolOutput> {
        self.inner().migrate_store(source, dest)
    }

    fn list_entries(&self, store: &StoreHandle) -> Result<ToolOutput> {
        self.inner().list_entries(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_follows_settings() {
        let mut settings = ToolSettings::default();
        assert_eq!(CredentialToolBackend::from_settings(&settings).name(), "native");
        settings.credential_tool = CredentialToolKind::Keytool;
        settings.keytool_path = "/opt/jdk/bin/keytool".to_string();
        match CredentialToolBackend::from_settings(&settings) {
            CredentialToolBackend::Keytool(tool) => assert_eq!(tool.name(), "keytool"),
            other => panic!("unexpected backend {:?}", other),
        }
    }
}
