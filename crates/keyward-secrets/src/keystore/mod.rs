//! Key and trust store access.
//!
//! A [`KeyStore`] is the in-memory view of a store file: an ordered map from
//! alias to either a private key with its certificate chain or a trusted
//! certificate. [`KeyStoreAccess`] reads and writes that view in PKCS12 or
//! JKS format.

pub mod cert;
pub mod jks;
pub mod pkcs12;

use indexmap::IndexMap;
use keyward_types::{KeywardError, Result, SecretBuffer, StoreHandle, StoreType};
use std::fs;
use std::path::Path;
use tracing::debug;

/// One entry of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEntry {
    /// A PKCS#8 private key and its certificate chain, leaf first
    PrivateKey {
        /// PKCS#8 DER private key
        key: Vec<u8>,
        /// DER certificates, leaf first
        chain: Vec<Vec<u8>>,
    },
    /// A trusted DER certificate
    TrustedCertificate(Vec<u8>),
}

impl StoreEntry {
    /// The entry's own certificate: the leaf of a key chain or the trusted
    /// certificate.
    pub fn certificate(&self) -> Option<&[u8]> {
        match self {
            StoreEntry::PrivateKey { chain, .. } => chain.first().map(Vec::as_slice),
            StoreEntry::TrustedCertificate(der) => Some(der),
        }
    }

    /// Short kind name in the style of `keytool -list`.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreEntry::PrivateKey { .. } => "PrivateKeyEntry",
            StoreEntry::TrustedCertificate(_) => "trustedCertEntry",
        }
    }
}

/// In-memory contents of a key or trust store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    store_type: StoreType,
    entries: IndexMap<String, StoreEntry>,
}

impl KeyStore {
    /// An empty store of the given type.
    pub fn new(store_type: StoreType) -> Self {
        Self {
            store_type,
            entries: IndexMap::new(),
        }
    }

    /// The store's format.
    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    /// The same entries in another format.
    pub fn convert(&self, store_type: StoreType) -> Self {
        let mut converted = Self::new(store_type);
        for (alias, entry) in &self.entries {
            converted.insert(alias, entry.clone());
        }
        converted
    }

    /// JKS aliases are case-insensitive and stored in lower case.
    fn normalize(&self, alias: &str) -> String {
        match self.store_type {
            StoreType::Jks => alias.to_lowercase(),
            StoreType::Pkcs12 => alias.to_string(),
        }
    }

    /// Aliases in store order.
    pub fn aliases(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Entries in store order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &StoreEntry)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an alias is present.
    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.contains_key(&self.normalize(alias))
    }

    /// Look up an entry.
    pub fn get(&self, alias: &str) -> Option<&StoreEntry> {
        self.entries.get(&self.normalize(alias))
    }

    /// The certificate of an entry.
    pub fn certificate(&self, alias: &str) -> Option<&[u8]> {
        self.get(alias).and_then(StoreEntry::certificate)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, alias: &str, entry: StoreEntry) {
        let alias = self.normalize(alias);
        self.entries.insert(alias, entry);
    }

    /// Certificates of every trusted-certificate entry.
    pub fn trusted_certificates(&self) -> Vec<&[u8]> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                StoreEntry::TrustedCertificate(der) => Some(der.as_slice()),
                StoreEntry::PrivateKey { .. } => None,
            })
            .collect()
    }
}

/// Reads and writes stores on disk.
#[derive(Debug, Clone, Copy)]
pub struct KeyStoreAccess {
    passwordless_pkcs12: bool,
}

impl Default for KeyStoreAccess {
    fn default() -> Self {
        Self::new(true)
    }
}

impl KeyStoreAccess {
    /// Store access; `passwordless_pkcs12` controls whether PKCS12 stores
    /// may be written without a password.
    pub fn new(passwordless_pkcs12: bool) -> Self {
        Self { passwordless_pkcs12 }
    }

    /// Whether PKCS12 stores may be written without a password.
    pub fn supports_passwordless_pkcs12(&self) -> bool {
        self.passwordless_pkcs12
    }

    /// Load a store.
    ///
    /// `flavor` names the store in diagnostics ("keystore", "truststore").
    /// A file carrying the JKS magic number is read as JKS whatever its
    /// declared type.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        password: Option<&SecretBuffer>,
        flavor: &str,
        declared: StoreType,
    ) -> Result<KeyStore> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            KeywardError::Store(format!(
                "Unable to locate specified {} {}: {}",
                flavor,
                path.display(),
                e
            ))
        })?;

        let actual = if jks::has_magic(&data) {
            StoreType::Jks
        } else {
            StoreType::Pkcs12
        };
        if actual != declared {
            debug!(
                "{} {} is declared {} but holds {} data",
                flavor,
                path.display(),
                declared,
                actual
            );
        }

        let result = match actual {
            StoreType::Jks => {
                let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
                    KeywardError::Store(format!("A password is required to read {} {}", flavor, path.display()))
                })?;
                jks::decode(&data, password)
            }
            StoreType::Pkcs12 => pkcs12::decode(&data, password),
        };
        result.map_err(|e| {
            KeywardError::Store(format!("Error reading from {} file {}: {}", flavor, path.display(), e))
        })
    }

    /// Load the store a handle describes.
    pub fn load_handle(&self, handle: &StoreHandle, flavor: &str) -> Result<KeyStore> {
        self.load(&handle.path, handle.password.as_ref(), flavor, handle.store_type)
    }

    /// Write a store in its own format.
    pub fn store(&self, store: &KeyStore, path: impl AsRef<Path>, password: Option<&SecretBuffer>) -> Result<()> {
        let path = path.as_ref();
        let data = match store.store_type() {
            StoreType::Jks => {
                let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
                    KeywardError::Validation(format!("JKS store {} requires a password", path.display()))
                })?;
                jks::encode(store, password)?
            }
            StoreType::Pkcs12 => {
                if StoreType::Pkcs12.is_passwordless(password) && !self.passwordless_pkcs12 {
                    return Err(KeywardError::Unsupported(
                        "password-less PKCS12 stores cannot be written in this environment".to_string(),
                    ));
                }
                pkcs12::encode(store, password)?
            }
        };
        fs::write(path, data)?;
        debug!("Wrote {} store {} ({} entries)", store.store_type(), path.display(), store.len());
        Ok(())
    }

    /// Write a store to the file a handle describes, converting it to the
    /// handle's type.
    pub fn store_handle(&self, store: &KeyStore, handle: &StoreHandle) -> Result<()> {
        if store.store_type() == handle.store_type {
            self.store(store, &handle.path, handle.password.as_ref())
        } else {
            self.store(&store.convert(handle.store_type), &handle.path, handle.password.as_ref())
        }
    }

    /// Aliases of a store file.
    pub fn list_aliases(
        &self,
        path: impl AsRef<Path>,
        password: Option<&SecretBuffer>,
        declared: StoreType,
    ) -> Result<Vec<String>> {
        Ok(self.load(path, password, "store", declared)?.aliases())
    }
}
