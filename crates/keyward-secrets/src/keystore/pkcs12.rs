//! PKCS#12 store codec.
//!
//! A password-less store is written and read with the empty password.

use keyward_types::{KeywardError, Result, SecretBuffer, StoreType};
use p12_keystore::{Certificate, KeyStore as Pkcs12Store, KeyStoreEntry, PrivateKeyChain};
use sha1::{Digest, Sha1};

use super::{KeyStore, StoreEntry};

fn password_str(password: Option<&SecretBuffer>) -> &str {
    password.map(SecretBuffer::expose).unwrap_or("")
}

fn store_error(e: impl std::fmt::Display) -> KeywardError {
    KeywardError::Store(e.to_string())
}

/// Decode a PKCS#12 file.
pub fn decode(data: &[u8], password: Option<&SecretBuffer>) -> Result<KeyStore> {
    let pkcs12 = Pkcs12Store::from_pkcs12(data, password_str(password)).map_err(store_error)?;

    let mut store = KeyStore::new(StoreType::Pkcs12);
    for (alias, entry) in pkcs12.entries() {
        let entry = match entry {
            KeyStoreEntry::Certificate(cert) => StoreEntry::TrustedCertificate(cert.as_der().to_vec()),
            KeyStoreEntry::PrivateKeyChain(chain) => StoreEntry::PrivateKey {
                key: chain.key().to_vec(),
                chain: chain.chain().iter().map(|c| c.as_der().to_vec()).collect(),
            },
        };
        store.insert(alias, entry);
    }
    Ok(store)
}

/// Encode a store as PKCS#12.
///
/// The local key id of a private key is the SHA-1 of its leaf certificate.
pub fn encode(store: &KeyStore, password: Option<&SecretBuffer>) -> Result<Vec<u8>> {
    let mut pkcs12 = Pkcs12Store::new();

    for (alias, entry) in store.entries() {
        let entry = match entry {
            StoreEntry::TrustedCertificate(der) => {
                KeyStoreEntry::Certificate(Certificate::from_der(der).map_err(store_error)?)
            }
            StoreEntry::PrivateKey { key, chain } => {
                let leaf = chain.first().ok_or_else(|| {
                    KeywardError::Store(format!("Private key {} has no certificate chain", alias))
                })?;
                let local_key_id = Sha1::digest(leaf).to_vec();
                let certs = chain
                    .iter()
                    .map(|der| Certificate::from_der(der).map_err(store_error))
                    .collect::<Result<Vec<_>>>()?;
                KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(key, local_key_id, certs))
            }
        };
        pkcs12.add_entry(alias, entry);
    }

    pkcs12
        .writer(password_str(password))
        .write()
        .map_err(store_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::testutil;

    #[test]
    fn test_wrong_password_is_rejected() {
        let (_, cert) = testutil::self_signed("NoSQL");
        let mut store = KeyStore::new(StoreType::Pkcs12);
        store.insert("mykey", StoreEntry::TrustedCertificate(cert));
        let data = encode(&store, Some(&SecretBuffer::from("changeit"))).unwrap();
        assert!(decode(&data, Some(&SecretBuffer::from("other!"))).is_err());
    }

    #[test]
    fn test_key_without_chain_is_rejected() {
        let mut store = KeyStore::new(StoreType::Pkcs12);
        store.insert("shared", StoreEntry::PrivateKey { key: vec![1, 2, 3], chain: vec![] });
        let err = encode(&store, None).unwrap_err();
        assert!(err.to_string().contains("has no certificate chain"));
    }
}
