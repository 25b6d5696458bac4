//! CLI command implementations.

pub mod host;
pub mod init;
pub mod keytab;
pub mod params;
pub mod password;
pub mod stores;
pub mod verify;

use keyward_core::config::ToolSettings;
use keyward_secrets::{CredentialToolBackend, KeyStoreAccess, StoreLifecycleManager};

/// Lifecycle manager over the credential tool chosen in the settings.
pub fn lifecycle(settings: &ToolSettings) -> StoreLifecycleManager<CredentialToolBackend> {
    StoreLifecycleManager::new(
        CredentialToolBackend::from_settings(settings),
        KeyStoreAccess::new(settings.passwordless_pkcs12),
    )
}
