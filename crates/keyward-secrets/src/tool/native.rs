//! In-process credential tool built on `rcgen`, `rsa` and the store codecs.
//!
//! Mirrors `keytool` semantics: failures are reported as exit code 1 with a
//! diagnostic line, and migrating a store onto itself keeps the original as
//! `<file>.old`.

use keyward_types::files::BACKUP_FILE_SUFFIX;
use keyward_types::{bail, CredentialTool, KeyPairRequest, KeywardError, Result, StoreHandle, ToolOutput};
use rand::RngCore;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SerialNumber};
use rsa::pkcs8::EncodePrivateKey;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::keystore::{cert, KeyStore, KeyStoreAccess, StoreEntry};

const NAME: &str = "native";

/// Credential tool that generates keys and edits stores without a JDK.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCredentialTool {
    access: KeyStoreAccess,
}

impl NativeCredentialTool {
    /// Tool writing stores through `access`.
    pub fn new(access: KeyStoreAccess) -> Self {
        Self { access }
    }

    fn report(what: &str, result: Result<Vec<String>>) -> ToolOutput {
        match result {
            Ok(lines) => ToolOutput::ok(lines),
            Err(e) => {
                debug!("{} failed: {}", what, e);
                ToolOutput::failed(1, vec![format!("{} error: {}", NAME, e)])
            }
        }
    }

    /// Load the store a handle names, or start an empty one when the file
    /// does not exist yet.
    fn load_or_create(&self, store: &StoreHandle) -> Result<KeyStore> {
        if store.path.exists() {
            self.access.load_handle(store, "keystore")
        } else {
            Ok(KeyStore::new(store.store_type))
        }
    }

    fn generate(&self, request: &KeyPairRequest) -> Result<Vec<String>> {
        let mut store = self.load_or_create(&request.store)?;
        if store.contains_alias(&request.alias) {
            bail!(Store, "Key pair not generated, alias <{}> already exists", request.alias);
        }

        let key_pair = generate_key(&request.key_algorithm, request.key_size)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = parse_dname(&request.dname)?;
        let now = time::OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + time::Duration::days(i64::from(request.validity_days));
        let mut serial = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut serial);
        serial[0] &= 0x7f;
        params.serial_number = Some(SerialNumber::from_slice(&serial));

        let certificate = params
            .self_signed(&key_pair)
            .map_err(|e| KeywardError::Certificate(e.to_string()))?;

        store.insert(
            &request.alias,
            StoreEntry::PrivateKey {
                key: key_pair.serialize_der(),
                chain: vec![certificate.der().to_vec()],
            },
        );
        self.access.store_handle(&store, &request.store)?;
        Ok(vec![format!(
            "Generated {} bit {} key pair and self-signed certificate for {}",
            request.key_size, request.key_algorithm, request.dname
        )])
    }

    fn export(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<Vec<String>> {
        let keystore = self.access.load_handle(store, "keystore")?;
        let der = keystore
            .certificate(alias)
            .ok_or_else(|| KeywardError::Store(format!("Alias <{}> does not exist", alias)))?;
        fs::write(cert_file, der)?;
        Ok(vec![format!("Certificate stored in file <{}>", cert_file.display())])
    }

    fn import(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<Vec<String>> {
        let der = cert::load_certificate_file(cert_file)?;
        cert::parse(&der)?;

        let mut truststore = self.load_or_create(store)?;
        if truststore.contains_alias(alias) {
            bail!(Store, "Certificate not imported, alias <{}> already exists", alias);
        }
        truststore.insert(alias, StoreEntry::TrustedCertificate(der));
        self.access.store_handle(&truststore, store)?;
        Ok(vec!["Certificate was added to keystore".to_string()])
    }

    fn migrate(&self, source: &StoreHandle, dest: &StoreHandle) -> Result<Vec<String>> {
        let contents = self.access.load_handle(source, "keystore")?;
        let dest = StoreHandle {
            password: dest.password.clone().or_else(|| source.password.clone()),
            ..dest.clone()
        };

        let mut lines: Vec<String> = contents
            .aliases()
            .iter()
            .map(|alias| format!("Entry for alias {} successfully imported.", alias))
            .collect();

        if source.path == dest.path {
            let mut backup = source.path.clone().into_os_string();
            backup.push(BACKUP_FILE_SUFFIX);
            let backup = PathBuf::from(backup);
            if backup.exists() {
                bail!(Store, "Backup file {} already exists", backup.display());
            }
            fs::rename(&source.path, &backup)?;
            if let Err(e) = self.access.store_handle(&contents, &dest) {
                fs::rename(&backup, &source.path)?;
                return Err(e);
            }
            lines.push(format!(
                "Migrated \"{}\" to {}. The {} keystore is backed up as \"{}\".",
                source.path.display(),
                dest.store_type,
                source.store_type,
                backup.display()
            ));
        } else {
            self.access.store_handle(&contents, &dest)?;
        }
        Ok(lines)
    }

    fn list(&self, store: &StoreHandle) -> Result<Vec<String>> {
        let keystore = self.access.load_handle(store, "keystore")?;
        let count = keystore.len();
        let mut lines = vec![
            format!("Keystore type: {}", keystore.store_type()),
            String::new(),
            format!("Your keystore contains {} {}", count, if count == 1 { "entry" } else { "entries" }),
            String::new(),
        ];
        for (alias, entry) in keystore.entries() {
            lines.push(format!("{}, {},", alias, entry.kind()));
            if let Some(der) = entry.certificate() {
                match cert::describe(der) {
                    Ok(details) => lines.extend(details),
                    Err(_) => lines.push(format!("Certificate fingerprint (SHA-256): {}", cert::fingerprint_sha256(der))),
                }
            }
        }
        Ok(lines)
    }
}

impl CredentialTool for NativeCredentialTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn generate_key_pair(&self, request: &KeyPairRequest) -> Result<ToolOutput> {
        Ok(Self::report("generate key pair", self.generate(request)))
    }

    fn export_certificate(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<ToolOutput> {
        Ok(Self::report("export certificate", self.export(store, alias, cert_file)))
    }

    fn import_certificate(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<ToolOutput> {
        Ok(Self::report("import certificate", self.import(store, alias, cert_file)))
    }

    fn migrate_store(&self, source: &StoreHandle, dest: &StoreHandle) -> Result<ToolOutput> {
        Ok(Self::report("migrate store", self.migrate(source, dest)))
    }

    fn list_entries(&self, store: &StoreHandle) -> Result<ToolOutput> {
        Ok(Self::report("list entries", self.list(store)))
    }
}

/// Generate a signing key: RSA of any size the `rsa` crate accepts, or EC on
/// P-256 / P-384.
fn generate_key(algorithm: &str, size: u32) -> Result<KeyPair> {
    let crypto_error = |e: &dyn std::fmt::Display| KeywardError::Certificate(format!("{} key generation failed: {}", algorithm, e));
    match (algorithm.to_uppercase().as_str(), size) {
        ("RSA", bits) => {
            let key = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, bits as usize).map_err(|e| crypto_error(&e))?;
            let der = key.to_pkcs8_der().map_err(|e| crypto_error(&e))?;
            KeyPair::try_from(der.as_bytes()).map_err(|e| crypto_error(&e))
        }
        ("EC", 256) => KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).map_err(|e| crypto_error(&e)),
        ("EC", 384) => KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384).map_err(|e| crypto_error(&e)),
        (other, bits) => Err(KeywardError::Unsupported(format!("{} keys of {} bits", other, bits))),
    }
}

/// Parse an X.500 name such as `cn=NoSQL, o=Example`.
///
/// The leftmost attribute is the most specific, so attributes are encoded
/// right to left. Commas may be escaped with a backslash.
fn parse_dname(dname: &str) -> Result<DistinguishedName> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = dname.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    let mut name = DistinguishedName::new();
    for part in parts.iter().rev() {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| KeywardError::Validation(format!("Invalid distinguished name: {}", dname)))?;
        let dn_type = match key.trim().to_lowercase().as_str() {
            "cn" => DnType::CommonName,
            "o" => DnType::OrganizationName,
            "ou" => DnType::OrganizationalUnitName,
            "c" => DnType::CountryName,
            "st" | "s" => DnType::StateOrProvinceName,
            "l" => DnType::LocalityName,
            other => bail!(Validation, "Unsupported attribute '{}' in distinguished name", other),
        };
        name.push(dn_type, value.trim());
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_types::{SecretBuffer, StoreType};
    use tempfile::TempDir;

    fn request(dir: &Path, store_type: StoreType, algorithm: &str, size: u32) -> KeyPairRequest {
        KeyPairRequest {
            store: StoreHandle::new(dir.join("store.keys"), store_type, Some(SecretBuffer::from("changeit"))).unwrap(),
            alias: "shared".to_string(),
            dname: "cn=NoSQL, o=Example".to_string(),
            key_algorithm: algorithm.to_string(),
            key_size: size,
            validity_days: 365,
        }
    }

    #[test]
    fn test_generate_export_import() {
        let dir = TempDir::new().unwrap();
        let tool = NativeCredentialTool::default();
        let request = request(dir.path(), StoreType::Pkcs12, "EC", 256);
        assert!(tool.generate_key_pair(&request).unwrap().success());

        let cert_file = dir.path().join("store.cert");
        assert!(tool.export_certificate(&request.store, "shared", &cert_file).unwrap().success());
        let der = fs::read(&cert_file).unwrap();
        assert_eq!(cert::subject_rfc1779(&der).unwrap(), "CN=NoSQL, O=Example");
        assert!(cert::is_self_signed(&der).unwrap());

        let trust = StoreHandle::new(dir.path().join("store.trust"), StoreType::Jks, Some(SecretBuffer::from("changeit"))).unwrap();
        assert!(tool.import_certificate(&trust, "mykey", &cert_file).unwrap().success());
        let again = tool.import_certificate(&trust, "mykey", &cert_file).unwrap();
        assert_eq!(again.code, 1);
        assert!(again.output[0].contains("already exists"));
    }

    #[test]
    fn test_duplicate_alias_and_bad_algorithm() {
        let dir = TempDir::new().unwrap();
        let tool = NativeCredentialTool::default();
        assert!(tool.generate_key_pair(&request(dir.path(), StoreType::Pkcs12, "EC", 256)).unwrap().success());
        assert!(!tool.generate_key_pair(&request(dir.path(), StoreType::Pkcs12, "EC", 256)).unwrap().success());

        let other = TempDir::new().unwrap();
        let result = tool.generate_key_pair(&request(other.path(), StoreType::Pkcs12, "DSA", 1024)).unwrap();
        assert_eq!(result.code, 1);
        assert!(result.output[0].starts_with("native error:"));
    }

    #[test]
    fn test_rsa_key_pair() {
        let dir = TempDir::new().unwrap();
        let tool = NativeCredentialTool::default();
        let request = request(dir.path(), StoreType::Jks, "RSA", 2048);
        assert!(tool.generate_key_pair(&request).unwrap().success());
        let listing = tool.list_entries(&request.store).unwrap();
        assert!(listing.output.contains(&"Keystore type: JKS".to_string()));
        assert!(listing.output.contains(&"shared, PrivateKeyEntry,".to_string()));
        assert!(listing.output.contains(&"Owner: CN=NoSQL, O=Example".to_string()));
        assert!(listing.output.contains(&"Issuer: CN=NoSQL, O=Example".to_string()));
        assert!(listing.output.iter().any(|line| line.starts_with("Certificate fingerprint (SHA-256): ")));
    }

    #[test]
    fn test_migrate_in_place_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let tool = NativeCredentialTool::default();
        let request = request(dir.path(), StoreType::Jks, "EC", 256);
        assert!(tool.generate_key_pair(&request).unwrap().success());

        let dest = StoreHandle { store_type: StoreType::Pkcs12, ..request.store.clone() };
        let result = tool.migrate_store(&request.store, &dest).unwrap();
        assert!(result.success(), "{:?}", result.output);
        assert!(dir.path().join("store.keys.old").exists());

        let migrated = KeyStoreAccess::default().load_handle(&dest, "keystore").unwrap();
        assert_eq!(migrated.store_type(), StoreType::Pkcs12);
        assert!(migrated.contains_alias("shared"));

        let refused = tool.migrate_store(&dest, &dest).unwrap();
        assert!(!refused.success());
    }

    #[test]
    fn test_parse_dname_escapes() {
        let name = parse_dname("cn=Doe\\, John, c=US").unwrap();
        let der = {
            let mut params = CertificateParams::default();
            params.distinguished_name = name;
            let key = KeyPair::generate().unwrap();
            params.self_signed(&key).unwrap().der().to_vec()
        };
        assert_eq!(cert::subject_rfc1779(&der).unwrap(), "CN=\"Doe, John\", C=US");
        assert!(parse_dname("nonsense").is_err());
        assert!(parse_dname("xx=1").is_err());
    }
}
