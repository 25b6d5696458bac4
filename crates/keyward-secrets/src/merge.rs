//! Merging the trusted certificates of one security directory into another.

use keyward_core::params::load_security_params;
use keyward_core::util::copy_owner_write_file;
use keyward_core::util::fs::remove_if_exists;
use keyward_types::files::{CLIENT_TRUSTSTORE_FILE, TEMP_CERT_FILE};
use keyward_types::{bail, CredentialTool, KeywardError, Result, SecretBuffer, SecurityParams, StoreHandle, StoreType};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::lifecycle::{persist_pkcs12_types, require_keystore_password, StoreLifecycleManager};

/// Copies truststore entries between security directories and brings the
/// destination's `client.trust` back in line.
pub struct TrustMerger<'a, T: CredentialTool> {
    lifecycle: &'a StoreLifecycleManager<T>,
}

impl<'a, T: CredentialTool> TrustMerger<'a, T> {
    /// Merger using the lifecycle manager's tool and store access.
    pub fn new(lifecycle: &'a StoreLifecycleManager<T>) -> Self {
        Self { lifecycle }
    }

    /// Import every certificate of the source truststore into the
    /// destination truststore, renaming colliding aliases `<alias>_2`,
    /// `<alias>_3`, ...
    ///
    /// Returns the aliases added to the destination.
    pub fn merge_trust(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        client_trust_password: Option<&SecretBuffer>,
    ) -> Result<Vec<String>> {
        let source = load_security_params(source_dir)?;
        let dest = load_security_params(dest_dir)?;

        if dest.truststore_type == StoreType::Pkcs12 && source.truststore_type == StoreType::Jks {
            bail!(
                Policy,
                "The new security configuration in {} was created with JKS KeyStores, but the existing \
                 security configuration in {} has PKCS12 KeyStores. Changing the type of an existing \
                 KeyStore from PKCS12 to JKS is not supported. Convert the new configuration to PKCS12 \
                 before retrying the operation.",
                source_dir.display(),
                dest_dir.display()
            );
        }

        let source_trust = self.truststore(source_dir, &source)?;
        let dest_password = require_keystore_password(&dest)?;
        let dest_trust = StoreHandle::new(
            dest_dir.join(&dest.truststore_file),
            dest.truststore_type,
            Some(dest_password.clone()),
        )?;

        let source_aliases = self.aliases(&source_trust)?;
        let mut taken: HashSet<String> = self.aliases(&dest_trust)?.into_iter().collect();

        let cert_file = source_dir.join(TEMP_CERT_FILE);
        let copied = self.copy_certificates(&source_trust, &dest_trust, &source_aliases, &mut taken, &cert_file);
        remove_if_exists(&cert_file)?;
        let added = copied?;
        info!(
            "Merged {} certificate(s) from {} into {}",
            added.len(),
            source_trust.path.display(),
            dest_trust.path.display()
        );

        match (dest.truststore_type, source.truststore_type) {
            (StoreType::Pkcs12, _) => {
                self.lifecycle
                    .create_client_trust_from_server_trust(dest_dir, &dest, &dest_password, client_trust_password)?;
            }
            (StoreType::Jks, StoreType::Jks) => {
                copy_owner_write_file(&dest_trust.path, dest_dir.join(CLIENT_TRUSTSTORE_FILE))?;
                debug!("Copied {} to {}", dest_trust.path.display(), CLIENT_TRUSTSTORE_FILE);
            }
            (StoreType::Jks, StoreType::Pkcs12) => {
                self.lifecycle
                    .create_client_trust_from_server_trust(dest_dir, &dest, &dest_password, client_trust_password)?;
                self.lifecycle.migrate_server_stores(dest_dir, &dest, &dest_password)?;
                persist_pkcs12_types(dest)?;
                info!("Converted the stores in {} to PKCS12", dest_dir.display());
            }
        }
        Ok(added)
    }

    fn truststore(&self, dir: &Path, params: &SecurityParams) -> Result<StoreHandle> {
        StoreHandle::new(
            dir.join(&params.truststore_file),
            params.truststore_type,
            Some(require_keystore_password(params)?),
        )
    }

    fn aliases(&self, store: &StoreHandle) -> Result<Vec<String>> {
        self.lifecycle
            .access()
            .load_handle(store, "truststore")
            .map(|loaded| loaded.aliases())
            .map_err(|e| {
                KeywardError::Store(format!("Failed to merge trust, unable to load {}: {}", store.path.display(), e))
            })
    }

    fn copy_certificates(
        &self,
        source: &StoreHandle,
        dest: &StoreHandle,
        aliases: &[String],
        taken: &mut HashSet<String>,
        cert_file: &Path,
    ) -> Result<Vec<String>> {
        let tool = self.lifecycle.tool();
        let mut added = Vec::with_capacity(aliases.len());
        for alias in aliases {
            tool.export_certificate(source, alias, cert_file)?
                .check(tool.name(), "Error exporting certificate")?;

            let alias = available_alias(alias, taken, dest.store_type);
            taken.insert(alias.clone());

            tool.import_certificate(dest, &alias, cert_file)?
                .check(tool.name(), "Error importing certificate to trustStore")?;
            added.push(alias);
        }
        Ok(added)
    }
}

/// `alias` itself when free, else the first free `<alias>_<n>` from 2 up.
///
/// JKS aliases are case-insensitive, so for a JKS destination the alias is
/// lower-cased before the lookup, matching how the store keeps them.
fn available_alias(alias: &str, taken: &HashSet<String>, dest_type: StoreType) -> String {
    let alias = match dest_type {
        StoreType::Jks => alias.to_lowercase(),
        StoreType::Pkcs12 => alias.to_string(),
    };
    if !taken.contains(&alias) {
        return alias;
    }
    (2..)
        .map(|i| format!("{}_{}", alias, i))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(alias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{KeyStoreAccess, StoreEntry};
    use crate::lifecycle::testutil::{manager, security_dir, PASSWORD};
    use crate::lifecycle::backup_path;
    use std::fs;

    fn load(path: &Path, store_type: StoreType, password: Option<&str>) -> crate::keystore::KeyStore {
        let password = password.map(SecretBuffer::from);
        KeyStoreAccess::default().load(path, password.as_ref(), "store", store_type).unwrap()
    }

    #[test]
    fn test_available_alias_counts_from_two() {
        let mut taken: HashSet<String> = ["mykey".to_string()].into_iter().collect();
        assert_eq!(available_alias("other", &taken, StoreType::Pkcs12), "other");
        assert_eq!(available_alias("mykey", &taken, StoreType::Pkcs12), "mykey_2");
        taken.insert("mykey_2".to_string());
        assert_eq!(available_alias("mykey", &taken, StoreType::Pkcs12), "mykey_3");
    }

    #[test]
    fn test_available_alias_ignores_case_for_jks() {
        let taken: HashSet<String> = ["mykey".to_string()].into_iter().collect();
        assert_eq!(available_alias("MyKey", &taken, StoreType::Pkcs12), "MyKey");
        assert_eq!(available_alias("MyKey", &taken, StoreType::Jks), "mykey_2");
        assert_eq!(available_alias("Other", &taken, StoreType::Jks), "other");
    }

    #[test]
    fn test_merge_mixed_case_alias_into_jks_keeps_existing_entry() {
        let (source, source_params) = security_dir(StoreType::Pkcs12, "cn=Source");
        let (dest, dest_params) = security_dir(StoreType::Jks, "cn=Dest");
        let access = KeyStoreAccess::default();
        let password = SecretBuffer::from(PASSWORD);

        let mut source_trust = load(&source_params.truststore_path(), StoreType::Pkcs12, Some(PASSWORD));
        let source_cert = source_trust.certificate("mykey").unwrap().to_vec();
        source_trust.insert("MyKey", StoreEntry::TrustedCertificate(source_cert));
        access.store(&source_trust, source_params.truststore_path(), Some(&password)).unwrap();
        let dest_cert = load(&dest_params.truststore_path(), StoreType::Jks, Some(PASSWORD))
            .certificate("mykey")
            .unwrap()
            .to_vec();

        let lifecycle = manager(access);
        let mut added = TrustMerger::new(&lifecycle).merge_trust(source.path(), dest.path(), None).unwrap();
        added.sort();
        assert_eq!(added, vec!["mykey_2".to_string(), "mykey_3".to_string()]);

        let truststore = load(&dest_params.truststore_path(), StoreType::Pkcs12, Some(PASSWORD));
        assert_eq!(truststore.len(), 3);
        assert_eq!(truststore.certificate("mykey"), Some(dest_cert.as_slice()));
    }

    #[test]
    fn test_merge_pkcs12_renames_collision() {
        let (source, _) = security_dir(StoreType::Pkcs12, "cn=Source");
        let (dest, dest_params) = security_dir(StoreType::Pkcs12, "cn=Dest");
        let lifecycle = manager(KeyStoreAccess::default());

        let added = TrustMerger::new(&lifecycle).merge_trust(source.path(), dest.path(), None).unwrap();
        assert_eq!(added, vec!["mykey_2".to_string()]);
        assert!(!source.path().join(TEMP_CERT_FILE).exists());

        let truststore = load(&dest_params.truststore_path(), StoreType::Pkcs12, Some(PASSWORD));
        let mut aliases = truststore.aliases();
        aliases.sort();
        assert_eq!(aliases, vec!["mykey".to_string(), "mykey_2".to_string()]);

        let client_trust = load(&dest.path().join(CLIENT_TRUSTSTORE_FILE), StoreType::Pkcs12, None);
        assert_eq!(client_trust.len(), 2);
        assert_eq!(client_trust.certificate("mykey_2"), truststore.certificate("mykey_2"));
    }

    #[test]
    fn test_merge_refuses_jks_into_pkcs12() {
        let (source, _) = security_dir(StoreType::Jks, "cn=Source");
        let (dest, dest_params) = security_dir(StoreType::Pkcs12, "cn=Dest");
        let before = fs::read(dest_params.truststore_path()).unwrap();

        let lifecycle = manager(KeyStoreAccess::default());
        let err = TrustMerger::new(&lifecycle).merge_trust(source.path(), dest.path(), None).unwrap_err();
        assert!(matches!(err, KeywardError::Policy(_)));
        assert!(err.to_string().contains("Changing the type of an existing KeyStore from PKCS12 to JKS"));
        assert_eq!(fs::read(dest_params.truststore_path()).unwrap(), before);
    }

    #[test]
    fn test_merge_jks_copies_truststore() {
        let (source, _) = security_dir(StoreType::Jks, "cn=Source");
        let (dest, dest_params) = security_dir(StoreType::Jks, "cn=Dest");
        let lifecycle = manager(KeyStoreAccess::default());

        TrustMerger::new(&lifecycle).merge_trust(source.path(), dest.path(), None).unwrap();
        assert_eq!(
            fs::read(dest.path().join(CLIENT_TRUSTSTORE_FILE)).unwrap(),
            fs::read(dest_params.truststore_path()).unwrap()
        );
    }

    #[test]
    fn test_merge_pkcs12_into_jks_converts_destination() {
        let (source, _) = security_dir(StoreType::Pkcs12, "cn=Source");
        let (dest, dest_params) = security_dir(StoreType::Jks, "cn=Dest");
        let lifecycle = manager(KeyStoreAccess::default());

        TrustMerger::new(&lifecycle).merge_trust(source.path(), dest.path(), None).unwrap();

        let updated = load_security_params(dest.path()).unwrap();
        assert_eq!(updated.keystore_type, StoreType::Pkcs12);
        assert_eq!(updated.truststore_type, StoreType::Pkcs12);
        assert!(backup_path(dest.path(), &dest_params.keystore_file).exists());
        assert!(backup_path(dest.path(), &dest_params.truststore_file).exists());

        let truststore = load(&dest_params.truststore_path(), StoreType::Pkcs12, Some(PASSWORD));
        assert_eq!(truststore.store_type(), StoreType::Pkcs12);
        assert_eq!(truststore.len(), 2);
    }
}
