//! Creation and migration of the stores in a security directory.
//!
//! A security directory holds one keystore, one truststore and a derived
//! `client.trust`. [`StoreLifecycleManager`] creates that set, regenerates
//! `client.trust` from the truststore, and migrates JKS stores to PKCS12.
//! Every step is gated on the previous one; nothing is rolled back, but
//! policy checks run before any store is touched.

use indexmap::IndexMap;
use keyward_core::client_security::write_client_security;
use keyward_core::params::{load_security_params, read_keystore_password, save_security_params};
use keyward_core::util::fs::remove_if_exists;
use keyward_core::util::{copy_owner_write_file, make_owner_only_write_access};
use keyward_types::files::{
    with_suffix, BACKUP_FILE_SUFFIX, CLIENT_TRUSTSTORE_FILE, STAGING_FILE_SUFFIX, TEMP_CERT_FILE,
};
use keyward_types::params::KEY_ALIAS_DEFAULT;
use keyward_types::{
    bail, CredentialTool, KeyPairRequest, KeywardError, ParamSetting, Result, SecretBuffer, SecurityParams,
    StoreHandle, StoreType,
};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::keystore::{cert, KeyStore, KeyStoreAccess, StoreEntry};

/// Shortest keystore password accepted.
pub const MIN_STORE_PASSPHRASE_LEN: usize = 6;

/// Alias of the server certificate in the truststore and `client.trust`.
pub const TRUSTED_CERT_ALIAS: &str = "mykey";

/// Settings of the key pair created by [`StoreLifecycleManager::init_key_store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStoreOptions {
    /// Scratch file the certificate is exported to
    pub cert_file: String,
    /// Certificate subject
    pub dname: String,
    /// `RSA` or `EC`
    pub key_algorithm: String,
    /// Key size in bits
    pub key_size: u32,
    /// Certificate validity in days
    pub validity_days: u32,
    /// Alias of the private-key entry
    pub key_alias: String,
    /// Type of the keystore and truststore
    pub store_type: StoreType,
}

impl Default for KeyStoreOptions {
    fn default() -> Self {
        Self {
            cert_file: "store.cert".to_string(),
            dname: "cn=NoSQL".to_string(),
            key_algorithm: "RSA".to_string(),
            key_size: 2048,
            validity_days: 365,
            key_alias: KEY_ALIAS_DEFAULT.to_string(),
            store_type: StoreType::Pkcs12,
        }
    }
}

impl KeyStoreOptions {
    /// Property names understood by [`KeyStoreOptions::from_properties`].
    pub const PROPERTY_NAMES: [&'static str; 7] = [
        "certFileName",
        "distinguishedName",
        "keyAlgorithm",
        "keySize",
        "validity",
        "keyAlias",
        "ksType",
    ];

    /// Defaults overridden by `name=value` properties.
    pub fn from_properties(props: &IndexMap<String, String>) -> Result<Self> {
        let mut options = Self::default();
        options.apply_properties(props)?;
        Ok(options)
    }

    /// Override these options with `name=value` properties.
    pub fn apply_properties(&mut self, props: &IndexMap<String, String>) -> Result<()> {
        for (name, value) in props {
            match name.as_str() {
                "certFileName" => self.cert_file = value.clone(),
                "distinguishedName" => self.dname = value.clone(),
                "keyAlgorithm" => self.key_algorithm = value.clone(),
                "keySize" => self.key_size = parse_number(name, value)?,
                "validity" => self.validity_days = parse_number(name, value)?,
                "keyAlias" => self.key_alias = value.clone(),
                "ksType" => self.store_type = value.parse()?,
                other => bail!(Validation, "Unknown keystore option: {}", other),
            }
        }
        Ok(())
    }
}

fn parse_number(name: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| KeywardError::Validation(format!("{} must be a positive number, got '{}'", name, value)))
}

/// Outcome of building a `client.trust` store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTrust {
    /// Type actually written
    pub store_type: StoreType,
    /// Whether password-less PKCS12 was refused and JKS written instead
    pub fell_back: bool,
}

/// Creates, regenerates and migrates the stores of security directories.
pub struct StoreLifecycleManager<T: CredentialTool> {
    tool: T,
    access: KeyStoreAccess,
}

impl<T: CredentialTool> StoreLifecycleManager<T> {
    /// Manager driving `tool`, reading and writing stores through `access`.
    pub fn new(tool: T, access: KeyStoreAccess) -> Self {
        Self { tool, access }
    }

    /// The credential tool in use.
    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// The store access in use.
    pub fn access(&self) -> &KeyStoreAccess {
        &self.access
    }

    /// Create the keystore, truststore and `client.trust` of a security
    /// directory, then write `client.security`.
    ///
    /// The scratch certificate file is removed whether or not the stores
    /// could be built.
    pub fn init_key_store(
        &self,
        dir: &Path,
        params: &SecurityParams,
        keystore_password: &SecretBuffer,
        client_trust_password: Option<&SecretBuffer>,
        options: &KeyStoreOptions,
    ) -> Result<ClientTrust> {
        if keystore_password.len() < MIN_STORE_PASSPHRASE_LEN {
            bail!(
                Policy,
                "The keystore password must be at least {} characters long",
                MIN_STORE_PASSPHRASE_LEN
            );
        }

        let keystore = StoreHandle::new(
            dir.join(&params.keystore_file),
            options.store_type,
            Some(keystore_password.clone()),
        )?;
        let truststore = StoreHandle::new(
            dir.join(&params.truststore_file),
            options.store_type,
            Some(keystore_password.clone()),
        )?;
        let cert_file = dir.join(&options.cert_file);
        let client_trust_file = dir.join(CLIENT_TRUSTSTORE_FILE);

        let request = KeyPairRequest {
            store: keystore.clone(),
            alias: options.key_alias.clone(),
            dname: options.dname.clone(),
            key_algorithm: options.key_algorithm.clone(),
            key_size: options.key_size,
            validity_days: options.validity_days,
        };
        self.tool
            .generate_key_pair(&request)?
            .check(self.tool.name(), "Error creating keyStore")?;

        let trust = self.export_and_trust(
            &keystore,
            &truststore,
            &options.key_alias,
            &cert_file,
            &client_trust_file,
            client_trust_password,
        );
        remove_if_exists(&cert_file)?;
        let trust = trust?;

        write_client_security(params, dir, Some(trust.store_type))?;
        for file in [&keystore.path, &truststore.path, &client_trust_file] {
            make_owner_only_write_access(file)?;
        }
        info!(
            "Created {} keystore {} and truststore {}",
            options.store_type,
            keystore.path.display(),
            truststore.path.display()
        );
        Ok(trust)
    }

    fn export_and_trust(
        &self,
        keystore: &StoreHandle,
        truststore: &StoreHandle,
        key_alias: &str,
        cert_file: &Path,
        client_trust_file: &Path,
        client_trust_password: Option<&SecretBuffer>,
    ) -> Result<ClientTrust> {
        self.tool
            .export_certificate(keystore, key_alias, cert_file)?
            .check(self.tool.name(), "Error exporting certificate")?;
        self.tool
            .import_certificate(truststore, TRUSTED_CERT_ALIAS, cert_file)?
            .check(self.tool.name(), "Error importing certificate to trustStore")?;

        let keystore_password = keystore
            .password
            .as_ref()
            .ok_or_else(|| KeywardError::Validation("The keystore has no password".to_string()))?;
        self.derive_client_trust(
            TRUSTED_CERT_ALIAS,
            client_trust_file,
            cert_file,
            keystore.store_type,
            client_trust_password,
            keystore_password,
        )
    }

    /// Write a trust store at `dest` holding only the certificate in
    /// `cert_file` under `alias`.
    ///
    /// With no client password a PKCS12 store is written without a password.
    /// When password-less PKCS12 is unsupported the store is written once
    /// more as JKS. A JKS store with no client password reuses the keystore
    /// password.
    pub fn derive_client_trust(
        &self,
        alias: &str,
        dest: &Path,
        cert_file: &Path,
        preferred_type: StoreType,
        client_password: Option<&SecretBuffer>,
        keystore_password: &SecretBuffer,
    ) -> Result<ClientTrust> {
        let der = cert::load_certificate_file(cert_file)?;
        cert::parse(&der)?;

        let mut store = KeyStore::new(preferred_type);
        store.insert(alias, StoreEntry::TrustedCertificate(der));

        let password = match (preferred_type, client_password) {
            (StoreType::Jks, None) => Some(keystore_password),
            (_, password) => password,
        };

        match self.access.store(&store, dest, password) {
            Ok(()) => Ok(ClientTrust {
                store_type: preferred_type,
                fell_back: false,
            }),
            Err(KeywardError::Unsupported(reason)) if preferred_type.is_passwordless(password) => {
                warn!(
                    "Failed to create a PKCS12 {} without password ({}), falling back to a JKS KeyStore. \
                     Specify a client trust password to create it as a password-protected PKCS12 KeyStore.",
                    CLIENT_TRUSTSTORE_FILE, reason
                );
                let store = store.convert(StoreType::Jks);
                self.access
                    .store(&store, dest, Some(client_password.unwrap_or(keystore_password)))?;
                Ok(ClientTrust {
                    store_type: StoreType::Jks,
                    fell_back: true,
                })
            }
            Err(e) => Err(KeywardError::Store(format!(
                "Error creating {} {}: {}",
                preferred_type, CLIENT_TRUSTSTORE_FILE, e
            ))),
        }
    }

    /// Migrate the JKS stores of a security directory to PKCS12.
    ///
    /// `client.trust` is rebuilt from the truststore, the truststore and the
    /// keystore are converted in place (originals kept as `.old`), and the
    /// new types are written to `security.yml`.
    pub fn update_key_store_type(
        &self,
        dir: &Path,
        target: StoreType,
        client_trust_password: Option<&SecretBuffer>,
    ) -> Result<()> {
        if target != StoreType::Pkcs12 {
            bail!(Policy, "Only support updating store type to PKCS12");
        }
        let params = load_security_params(dir)?;
        if params.keystore_type != StoreType::Jks || params.truststore_type != StoreType::Jks {
            bail!(Policy, "Only support updating JKS KeyStores to PKCS12");
        }
        let keystore_password = require_keystore_password(&params)?;

        check_no_backup(dir, CLIENT_TRUSTSTORE_FILE, client_trust_backup_message)?;
        check_no_backup(dir, &params.truststore_file, truststore_backup_message)?;
        check_no_backup(dir, &params.keystore_file, keystore_backup_message)?;

        self.create_client_trust_from_server_trust(dir, &params, &keystore_password, client_trust_password)?;
        self.migrate_store_in_place(dir, &params.truststore_file, &keystore_password, truststore_backup_message)?;
        self.migrate_store_in_place(dir, &params.keystore_file, &keystore_password, keystore_backup_message)?;
        persist_pkcs12_types(params)?;
        info!("Updated the stores in {} to PKCS12", dir.display());
        Ok(())
    }

    /// Rebuild `client.trust` from every certificate of the truststore.
    ///
    /// The existing `client.trust` is kept as `client.trust.old`; the new one
    /// is staged as `client.trust.new`. Either file already existing refuses
    /// the operation.
    pub fn create_client_trust_from_server_trust(
        &self,
        dir: &Path,
        params: &SecurityParams,
        keystore_password: &SecretBuffer,
        client_trust_password: Option<&SecretBuffer>,
    ) -> Result<ClientTrust> {
        let truststore = StoreHandle::new(
            dir.join(&params.truststore_file),
            params.truststore_type,
            Some(keystore_password.clone()),
        )?;
        let aliases = self
            .access
            .load_handle(&truststore, "truststore")
            .map_err(|e| {
                KeywardError::Store(format!(
                    "Failed to create {}, unable to load {}: {}",
                    CLIENT_TRUSTSTORE_FILE,
                    truststore.path.display(),
                    e
                ))
            })?
            .aliases();
        if aliases.is_empty() {
            bail!(Store, "Truststore {} holds no certificates", truststore.path.display());
        }

        let client_trust_file = dir.join(CLIENT_TRUSTSTORE_FILE);
        let backup = backup_path(dir, CLIENT_TRUSTSTORE_FILE);
        let staging = dir.join(with_suffix(CLIENT_TRUSTSTORE_FILE, STAGING_FILE_SUFFIX));
        let cert_file = dir.join(TEMP_CERT_FILE);

        if !create_new(&backup)? {
            bail!(Policy, "{}", client_trust_backup_message(dir, &backup));
        }
        if !create_new(&staging)? {
            bail!(
                Policy,
                "Unable to update type of {} in {}, remove or rename existing {}",
                CLIENT_TRUSTSTORE_FILE,
                dir.display(),
                staging.display()
            );
        }
        if client_trust_file.exists() {
            copy_owner_write_file(&client_trust_file, &backup)?;
        }

        let result = self
            .copy_trusted_certificates(&truststore, &aliases, &staging, &cert_file, client_trust_password)
            .and_then(|trust| {
                write_client_security(params, dir, Some(trust.store_type))?;
                copy_owner_write_file(&staging, &client_trust_file)?;
                Ok(trust)
            });
        remove_if_exists(&cert_file)?;
        remove_if_exists(&staging)?;
        let trust = result?;
        info!("Rebuilt {} as {} from {}", client_trust_file.display(), trust.store_type, truststore.path.display());
        Ok(trust)
    }

    fn copy_trusted_certificates(
        &self,
        truststore: &StoreHandle,
        aliases: &[String],
        staging: &Path,
        cert_file: &Path,
        client_trust_password: Option<&SecretBuffer>,
    ) -> Result<ClientTrust> {
        let keystore_password = truststore
            .password
            .as_ref()
            .ok_or_else(|| KeywardError::Validation("The truststore has no password".to_string()))?;

        let mut trust: Option<(ClientTrust, StoreHandle)> = None;
        for alias in aliases {
            self.tool
                .export_certificate(truststore, alias, cert_file)?
                .check(
                    self.tool.name(),
                    &format!("Error exporting certificate from {}", truststore.path.display()),
                )?;

            match &trust {
                None => {
                    let created = self.derive_client_trust(
                        alias,
                        staging,
                        cert_file,
                        StoreType::Pkcs12,
                        client_trust_password,
                        keystore_password,
                    )?;
                    let password = match created.store_type {
                        StoreType::Jks => Some(client_trust_password.unwrap_or(keystore_password).clone()),
                        StoreType::Pkcs12 => client_trust_password.cloned(),
                    };
                    let handle = StoreHandle::new(staging, created.store_type, password)?;
                    trust = Some((created, handle));
                }
                Some((_, handle)) => {
                    self.tool
                        .import_certificate(handle, alias, cert_file)?
                        .check(
                            self.tool.name(),
                            &format!("Error importing certificate to {}", staging.display()),
                        )?;
                }
            }
        }
        trust
            .map(|(trust, _)| trust)
            .ok_or_else(|| KeywardError::Store(format!("No certificates copied to {}", staging.display())))
    }

    /// Convert a JKS store to PKCS12 in place, keeping the original as
    /// `<file>.old`.
    fn migrate_store_in_place(
        &self,
        dir: &Path,
        file: &str,
        password: &SecretBuffer,
        backup_message: fn(&Path, &Path) -> String,
    ) -> Result<()> {
        check_no_backup(dir, file, backup_message)?;
        let path = dir.join(file);
        let source = StoreHandle::new(&path, StoreType::Jks, Some(password.clone()))?;
        let dest = StoreHandle::new(&path, StoreType::Pkcs12, Some(password.clone()))?;
        self.tool
            .migrate_store(&source, &dest)?
            .check(self.tool.name(), &format!("Error migrating {}", path.display()))?;
        make_owner_only_write_access(&path)?;
        debug!("Migrated {} to PKCS12", path.display());
        Ok(())
    }

    /// Convert the keystore, then the truststore, of a directory to PKCS12.
    pub(crate) fn migrate_server_stores(
        &self,
        dir: &Path,
        params: &SecurityParams,
        password: &SecretBuffer,
    ) -> Result<()> {
        check_no_backup(dir, &params.keystore_file, keystore_backup_message)?;
        check_no_backup(dir, &params.truststore_file, truststore_backup_message)?;
        self.migrate_store_in_place(dir, &params.keystore_file, password, keystore_backup_message)?;
        self.migrate_store_in_place(dir, &params.truststore_file, password, truststore_backup_message)
    }

    /// Text listing of the keystore and truststore of a directory.
    pub fn print_key_stores(&self, dir: &Path) -> Result<String> {
        let params = load_security_params(dir)?;
        let password = read_keystore_password(&params)?;
        let keystore = self.print_key_store(&dir.join(&params.keystore_file), params.keystore_type, password.clone());
        let truststore = self.print_key_store(&dir.join(&params.truststore_file), params.truststore_type, password);
        Ok(format!("{}\n{}", keystore, truststore))
    }

    fn print_key_store(&self, path: &Path, store_type: StoreType, password: Option<SecretBuffer>) -> String {
        let listing = StoreHandle::new(path, store_type, password).and_then(|store| self.tool.list_entries(&store));
        match listing {
            Ok(result) if result.success() => {
                let mut text = format!("Keystore: {}\n", path.display());
                for line in &result.output {
                    text.push_str(line);
                    text.push('\n');
                }
                text
            }
            Ok(result) => format!("Error listing keyStore: [{}]", result.output.join(", ")),
            Err(e) => format!("Error listing keyStore: {}", e),
        }
    }

    /// Aliases of a store file.
    pub fn list_key_store(&self, path: &Path, password: Option<&SecretBuffer>) -> Result<Vec<String>> {
        self.access.list_aliases(path, password, StoreType::Pkcs12)
    }

    /// Apply parameter settings to the `security.yml` of a directory.
    pub fn update_security_params(&self, dir: &Path, settings: &[ParamSetting]) -> Result<()> {
        let mut params = load_security_params(dir)?;
        params.apply_changes(settings)?;
        save_security_params(&params)?;
        info!("Updated {} parameter(s) in {}", settings.len(), dir.display());
        Ok(())
    }
}

/// Record PKCS12 as the type of both server stores.
pub fn persist_pkcs12_types(mut params: SecurityParams) -> Result<()> {
    params.keystore_type = StoreType::Pkcs12;
    params.truststore_type = StoreType::Pkcs12;
    save_security_params(&params)
}

/// Create an empty file; `Ok(false)` when it already exists.
fn create_new(path: &Path) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn check_no_backup(dir: &Path, file: &str, message: fn(&Path, &Path) -> String) -> Result<()> {
    let backup = backup_path(dir, file);
    if backup.exists() {
        return Err(KeywardError::Policy(message(dir, &backup)));
    }
    Ok(())
}

fn client_trust_backup_message(dir: &Path, backup: &Path) -> String {
    format!(
        "Unable to update type of Java KeyStore, the backup files of existing KeyStores exists in {}, \
         remove or rename existing {}",
        dir.display(),
        backup.display()
    )
}

fn truststore_backup_message(dir: &Path, backup: &Path) -> String {
    format!(
        "Unable to update the type of Java TrustStore because a backup copy of the server TrustStore \
         already exists in {}. Retry after removing or renaming file: {}",
        dir.display(),
        backup.display()
    )
}

fn keystore_backup_message(dir: &Path, backup: &Path) -> String {
    format!(
        "Unable to update the type of the Java KeyStore because a backup copy of the server KeyStore \
         already exists in {}. Retry after removing or renaming file: {}",
        dir.display(),
        backup.display()
    )
}

/// Path of the `.old` backup of a file in a directory.
pub fn backup_path(dir: &Path, file: &str) -> PathBuf {
    dir.join(with_suffix(file, BACKUP_FILE_SUFFIX))
}

/// Read the keystore password of a directory, failing when none is stored.
pub(crate) fn require_keystore_password(params: &SecurityParams) -> Result<SecretBuffer> {
    read_keystore_password(params)?.ok_or_else(|| {
        KeywardError::Policy(format!(
            "Unable to retrieve the keystore password of {}",
            params.config_dir.display()
        ))
    })
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::tool::NativeCredentialTool;
    use keyward_core::params::write_password_file;
    use tempfile::TempDir;

    pub const PASSWORD: &str = "changeit";

    pub fn manager(access: KeyStoreAccess) -> StoreLifecycleManager<NativeCredentialTool> {
        StoreLifecycleManager::new(NativeCredentialTool::new(access), access)
    }

    pub fn ec_options(store_type: StoreType) -> KeyStoreOptions {
        KeyStoreOptions {
            key_algorithm: "EC".to_string(),
            key_size: 256,
            store_type,
            ..KeyStoreOptions::default()
        }
    }

    /// A security directory initialised with stores of `store_type`, its
    /// parameters and password file saved.
    pub fn security_dir(store_type: StoreType, dname: &str) -> (TempDir, SecurityParams) {
        let dir = TempDir::new().unwrap();
        let mut params = SecurityParams::default().with_config_dir(dir.path());
        params.keystore_type = store_type;
        params.truststore_type = store_type;
        save_security_params(&params).unwrap();
        write_password_file(&params, &SecretBuffer::from(PASSWORD)).unwrap();

        let options = KeyStoreOptions {
            dname: dname.to_string(),
            ..ec_options(store_type)
        };
        manager(KeyStoreAccess::default())
            .init_key_store(dir.path(), &params, &SecretBuffer::from(PASSWORD), None, &options)
            .unwrap();
        (dir, params)
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use keyward_types::traits::MockCredentialTool;
    use keyward_types::ToolOutput;
    use std::fs;
    use tempfile::TempDir;

    fn load(path: &Path, store_type: StoreType, password: Option<&str>) -> KeyStore {
        let password = password.map(SecretBuffer::from);
        KeyStoreAccess::default().load(path, password.as_ref(), "store", store_type).unwrap()
    }

    #[test]
    fn test_init_key_store() {
        let (dir, params) = security_dir(StoreType::Pkcs12, "cn=NoSQL");
        let keystore = load(&params.keystore_path(), StoreType::Pkcs12, Some(PASSWORD));
        let truststore = load(&params.truststore_path(), StoreType::Pkcs12, Some(PASSWORD));

        assert_eq!(truststore.aliases(), vec![TRUSTED_CERT_ALIAS.to_string()]);
        assert_eq!(truststore.certificate(TRUSTED_CERT_ALIAS), keystore.certificate("shared"));

        let client_trust = load(&dir.path().join(CLIENT_TRUSTSTORE_FILE), StoreType::Pkcs12, None);
        assert_eq!(client_trust.certificate(TRUSTED_CERT_ALIAS), keystore.certificate("shared"));
        assert!(dir.path().join("client.security").exists());
        assert!(!dir.path().join("store.cert").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(params.keystore_path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_short_password_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut tool = MockCredentialTool::new();
        tool.expect_generate_key_pair().times(0);
        let manager = StoreLifecycleManager::new(tool, KeyStoreAccess::default());
        let err = manager
            .init_key_store(
                dir.path(),
                &SecurityParams::default(),
                &SecretBuffer::from("short"),
                None,
                &KeyStoreOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, KeywardError::Policy(_)));
    }

    #[test]
    fn test_tool_failure_removes_scratch_certificate() {
        let dir = TempDir::new().unwrap();
        let mut tool = MockCredentialTool::new();
        tool.expect_name().return_const("mock");
        tool.expect_generate_key_pair().returning(|_| Ok(ToolOutput::ok(vec![])));
        tool.expect_export_certificate().returning(|_, _, cert_file| {
            fs::write(cert_file, b"partial").unwrap();
            Ok(ToolOutput::failed(1, vec!["export failed".to_string()]))
        });
        tool.expect_import_certificate().times(0);

        let manager = StoreLifecycleManager::new(tool, KeyStoreAccess::default());
        let err = manager
            .init_key_store(
                dir.path(),
                &SecurityParams::default(),
                &SecretBuffer::from(PASSWORD),
                None,
                &KeyStoreOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, KeywardError::Tool { code: 1, .. }));
        assert!(!dir.path().join("store.cert").exists());
        assert!(!dir.path().join(CLIENT_TRUSTSTORE_FILE).exists());
    }

    #[test]
    fn test_passwordless_fallback_to_jks() {
        let (dir, params) = security_dir(StoreType::Pkcs12, "cn=NoSQL");
        let cert_file = dir.path().join("exported.cert");
        let keystore = load(&params.keystore_path(), StoreType::Pkcs12, Some(PASSWORD));
        fs::write(&cert_file, keystore.certificate("shared").unwrap()).unwrap();

        let strict = manager(KeyStoreAccess::new(false));
        let dest = dir.path().join("fallback.trust");
        let trust = strict
            .derive_client_trust("mykey", &dest, &cert_file, StoreType::Pkcs12, None, &SecretBuffer::from(PASSWORD))
            .unwrap();
        assert_eq!(trust, ClientTrust { store_type: StoreType::Jks, fell_back: true });
        assert_eq!(load(&dest, StoreType::Jks, Some(PASSWORD)).aliases(), vec!["mykey".to_string()]);

        let with_password = strict
            .derive_client_trust(
                "mykey",
                &dest,
                &cert_file,
                StoreType::Pkcs12,
                Some(&SecretBuffer::from("ctspass")),
                &SecretBuffer::from(PASSWORD),
            )
            .unwrap();
        assert_eq!(with_password, ClientTrust { store_type: StoreType::Pkcs12, fell_back: false });
    }

    #[test]
    fn test_existing_backup_blocks_update() {
        let (dir, params) = security_dir(StoreType::Jks, "cn=NoSQL");
        fs::write(backup_path(dir.path(), &params.truststore_file), b"old").unwrap();
        let keystore_before = fs::read(params.keystore_path()).unwrap();
        let truststore_before = fs::read(params.truststore_path()).unwrap();

        let err = manager(KeyStoreAccess::default())
            .update_key_store_type(dir.path(), StoreType::Pkcs12, None)
            .unwrap_err();
        assert!(err.to_string().contains("a backup copy of the server TrustStore already exists"));
        assert_eq!(fs::read(params.keystore_path()).unwrap(), keystore_before);
        assert_eq!(fs::read(params.truststore_path()).unwrap(), truststore_before);
        assert!(!backup_path(dir.path(), CLIENT_TRUSTSTORE_FILE).exists());
    }

    #[test]
    fn test_update_jks_to_pkcs12() {
        let (dir, params) = security_dir(StoreType::Jks, "cn=NoSQL");
        let manager = manager(KeyStoreAccess::default());
        manager.update_key_store_type(dir.path(), StoreType::Pkcs12, None).unwrap();

        let updated = load_security_params(dir.path()).unwrap();
        assert_eq!(updated.keystore_type, StoreType::Pkcs12);
        assert_eq!(updated.truststore_type, StoreType::Pkcs12);
        assert!(backup_path(dir.path(), &params.keystore_file).exists());
        assert!(backup_path(dir.path(), &params.truststore_file).exists());
        assert!(backup_path(dir.path(), CLIENT_TRUSTSTORE_FILE).exists());
        assert!(!dir.path().join("client.trust.new").exists());
        assert!(!dir.path().join(TEMP_CERT_FILE).exists());

        let keystore = load(&params.keystore_path(), StoreType::Pkcs12, Some(PASSWORD));
        assert_eq!(keystore.store_type(), StoreType::Pkcs12);
        let client_trust = load(&dir.path().join(CLIENT_TRUSTSTORE_FILE), StoreType::Pkcs12, None);
        assert_eq!(client_trust.certificate(TRUSTED_CERT_ALIAS), keystore.certificate("shared"));

        let again = manager.update_key_store_type(dir.path(), StoreType::Pkcs12, None).unwrap_err();
        assert!(again.to_string().contains("Only support updating JKS KeyStores to PKCS12"));
    }

    #[test]
    fn test_update_rejects_jks_target() {
        let err = manager(KeyStoreAccess::default())
            .update_key_store_type(Path::new("/nonexistent"), StoreType::Jks, None)
            .unwrap_err();
        assert!(err.to_string().contains("Only support updating store type to PKCS12"));
    }

    #[test]
    fn test_print_key_stores() {
        let (dir, params) = security_dir(StoreType::Pkcs12, "cn=NoSQL");
        let text = manager(KeyStoreAccess::default()).print_key_stores(dir.path()).unwrap();
        assert!(text.starts_with(&format!("Keystore: {}\n", params.keystore_path().display())));
        assert!(text.contains(&format!("Keystore: {}\n", params.truststore_path().display())));
        assert!(text.contains("shared, PrivateKeyEntry,"));
        assert!(text.contains("mykey, trustedCertEntry,"));
    }

    #[test]
    fn test_print_reports_listing_errors() {
        let dir = TempDir::new().unwrap();
        let params = SecurityParams::default().with_config_dir(dir.path());
        save_security_params(&params).unwrap();
        let text = manager(KeyStoreAccess::default()).print_key_stores(dir.path()).unwrap();
        assert!(text.starts_with("Error listing keyStore:"));
    }

    #[test]
    fn test_update_security_params() {
        let dir = TempDir::new().unwrap();
        let manager = manager(KeyStoreAccess::default());
        let setting = ParamSetting::parse("krbRealmName=EXAMPLE.COM", None).unwrap();
        assert!(manager.update_security_params(dir.path(), &[setting.clone()]).is_err());

        save_security_params(&SecurityParams::default().with_config_dir(dir.path())).unwrap();
        manager.update_security_params(dir.path(), &[setting]).unwrap();
        assert_eq!(load_security_params(dir.path()).unwrap().kerberos.realm_name, "EXAMPLE.COM");
    }

    #[test]
    fn test_options_from_properties() {
        let mut props = IndexMap::new();
        props.insert("keySize".to_string(), "4096".to_string());
        props.insert("ksType".to_string(), "jks".to_string());
        let options = KeyStoreOptions::from_properties(&props).unwrap();
        assert_eq!(options.key_size, 4096);
        assert_eq!(options.store_type, StoreType::Jks);
        assert_eq!(options.key_alias, "shared");

        props.insert("bogus".to_string(), "1".to_string());
        assert!(KeyStoreOptions::from_properties(&props).is_err());
    }
}
