//! Consistency checks over the transport security configuration of a
//! security directory.
//!
//! Findings are plain messages; an empty report means the configuration is
//! consistent. Only a missing or unreadable `security.yml` is an error.

use keyward_core::params::{load_security_params, read_keystore_password};
use keyward_types::{Result, SecretBuffer, SecurityParams, Transport};
use regex::Regex;
use std::path::Path;
use tracing::debug;

use crate::keystore::{cert, KeyStoreAccess, StoreEntry};

/// Protocols a transport must allow at least one of.
pub const PREFERRED_PROTOCOLS: [&str; 2] = ["TLSv1.3", "TLSv1.2"];

const DNMATCH_PREFIX: &str = "dnmatch(";

/// Outcome of checking a protocol list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolCheck {
    /// At least one preferred protocol is listed
    Preferred,
    /// No preferred protocol is listed
    NotPreferred,
    /// The list has no entries
    Malformed,
}

/// Check a comma-separated protocol list against [`PREFERRED_PROTOCOLS`].
pub fn check_protocols(protocols: &str) -> ProtocolCheck {
    let listed: Vec<&str> = protocols.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if listed.is_empty() {
        ProtocolCheck::Malformed
    } else if listed.iter().any(|p| PREFERRED_PROTOCOLS.contains(p)) {
        ProtocolCheck::Preferred
    } else {
        ProtocolCheck::NotPreferred
    }
}

/// Whether `identity` fully matches the regex inside a `dnmatch(<regex>)`
/// pattern. `Err` describes a malformed pattern.
pub fn identity_allowed(pattern: &str, identity: &str) -> std::result::Result<bool, String> {
    let regex = pattern
        .strip_prefix(DNMATCH_PREFIX)
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| format!("Allowed identity '{}' is not of the form dnmatch(<regex>).", pattern))?;
    let regex = Regex::new(&format!("^(?:{})$", regex))
        .map_err(|e| format!("Invalid regular expression in allowed identity '{}': {}", pattern, e))?;
    Ok(regex.is_match(identity))
}

fn malformed_protocols(transport: &str, protocols: &str) -> String {
    format!(
        "Problem with protocols specified for transport {}: '{}' does not have the correct format, \
         must be specified in the format 'x,y,z', using commas as delimiters",
        transport, protocols
    )
}

/// Checks a security directory's transport settings and stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigVerifier {
    access: KeyStoreAccess,
}

impl ConfigVerifier {
    /// Verifier reading stores through `access`.
    pub fn new(access: KeyStoreAccess) -> Self {
        Self { access }
    }

    /// Run every check against a security directory.
    pub fn verify_configuration(&self, dir: &Path) -> Result<Vec<String>> {
        let params = load_security_params(dir)?;
        let mut findings = verify_params(&params);
        if let Some(finding) = self.check_keystore_installation(&params) {
            findings.push(finding);
        }
        debug!("Verification of {} found {} problem(s)", dir.display(), findings.len());
        Ok(findings)
    }

    /// Check the keystore and truststore against the internal transport:
    /// the server key exists, its subject is an allowed identity, its chain
    /// is trusted and the truststore holds its certificate.
    pub fn check_keystore_installation(&self, params: &SecurityParams) -> Option<String> {
        let password = match read_keystore_password(params) {
            Ok(Some(password)) => password,
            Ok(None) | Err(_) => return Some("Unable to create keystore password source.".to_string()),
        };
        self.check_stores(params, &password)
            .unwrap_or_else(|e| Some(format!("Unexpected error: {}", e)))
    }

    fn check_stores(&self, params: &SecurityParams, password: &SecretBuffer) -> Result<Option<String>> {
        let internal = params.transport(Transport::Internal);
        let alias = &internal.server_key_alias;
        let allowed = &internal.client_identity_allowed;
        let keystore_path = params.keystore_path();
        let truststore_path = params.truststore_path();

        let keystore = self
            .access
            .load(&keystore_path, Some(password), "keystore", params.keystore_type)?;
        let truststore = self
            .access
            .load(&truststore_path, Some(password), "truststore", params.truststore_type)?;

        let chain = match keystore.get(alias) {
            Some(StoreEntry::PrivateKey { chain, .. }) if !chain.is_empty() => chain,
            _ => return Ok(Some(format!("Private key {} does not exist in the keystore.", alias))),
        };
        let leaf = &chain[0];
        let Ok(parsed) = cert::parse(leaf) else {
            return Ok(Some(format!("Certificate of {} is not a valid X509 certificate.", alias)));
        };

        let subject = parsed.subject().to_string();
        let rfc1779 = cert::rfc1779(parsed.subject());
        match identity_allowed(allowed, &rfc1779) {
            Ok(true) => {}
            Ok(false) => {
                return Ok(Some(format!(
                    "The certificate's subject name '{}' when displayed in RFC 1779 format as '{}' \
                     does not match '{}' specified in allowedIdentities.",
                    subject, rfc1779, allowed
                )))
            }
            Err(finding) => return Ok(Some(finding)),
        }

        if cert::is_self_signed(leaf)? {
            return Ok(None);
        }

        let intermediates: Vec<&[u8]> = chain[1..].iter().map(Vec::as_slice).collect();
        if let Err(e) = cert::validate_chain(leaf, &intermediates, &keystore.trusted_certificates()) {
            debug!("Chain of {} rejected: {}", alias, e);
            return Ok(Some(format!(
                "Problem with verifying certificate chain in keystore {}.",
                keystore_path.display()
            )));
        }

        if !truststore.entries().any(|(_, entry)| entry.certificate() == Some(leaf.as_slice())) {
            return Ok(Some(format!(
                "{} must contain the certificate {}.",
                truststore_path.display(),
                subject
            )));
        }
        Ok(None)
    }
}

/// Protocol, key alias and identity checks over the parameters alone.
pub fn verify_params(params: &SecurityParams) -> Vec<String> {
    let mut findings = Vec::new();
    let internal = params.transport(Transport::Internal);
    let client = params.transport(Transport::Client);
    let ha = params.transport(Transport::Ha);

    match check_protocols(&ha.allow_protocols) {
        ProtocolCheck::Preferred => {}
        ProtocolCheck::NotPreferred => findings.push(format!(
            "Transport HA is not using preferred protocols. Found: {} Preferred protocols: {}",
            ha.allow_protocols,
            PREFERRED_PROTOCOLS.join(",")
        )),
        ProtocolCheck::Malformed => findings.push(malformed_protocols("HA", &ha.allow_protocols)),
    }
    for (name, transport) in [(Transport::Internal, internal), (Transport::Client, client)] {
        let protocols = &transport.client_allow_protocols;
        match check_protocols(protocols) {
            ProtocolCheck::Preferred => {}
            ProtocolCheck::NotPreferred => findings.push(format!(
                "Transport {} is not using preferred protocols {}, the preferred protocols are {}",
                name,
                protocols,
                PREFERRED_PROTOCOLS.join(",")
            )),
            ProtocolCheck::Malformed => findings.push(malformed_protocols(&name.to_string(), protocols)),
        }
    }

    let server_alias = &internal.server_key_alias;
    for (other, role) in [
        (&internal.client_key_alias, "client"),
        (&ha.server_key_alias, "HA transport"),
        (&client.server_key_alias, "server for client transport"),
    ] {
        if server_alias != other {
            findings.push(format!(
                "Key alias of internal transport server {} is not the same as {} {}.",
                server_alias, role, other
            ));
        }
    }

    let identity = &internal.client_identity_allowed;
    if &internal.server_identity_allowed != identity {
        findings.push(format!(
            "Identities allowed by server side of internal transport {} are not the same as client side \
             of internal transport {}.",
            internal.server_identity_allowed, identity
        ));
    }
    if &ha.server_identity_allowed != identity {
        findings.push(format!(
            "Identities allowed by HA transport {} are not the same as internal transport {}.",
            ha.server_identity_allowed, identity
        ));
    }
    if &client.server_identity_allowed != identity {
        findings.push(format!(
            "Identities allowed by client transport {} are not the same as internal transport {}.",
            client.server_identity_allowed, identity
        ));
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::KeyStore;
    use crate::lifecycle::testutil::{security_dir, PASSWORD};
    use keyward_core::params::{save_security_params, write_password_file};
    use keyward_types::StoreType;
    use proptest::prelude::*;
    use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
    use std::fs;
    use tempfile::TempDir;

    fn verify(dir: &Path) -> Vec<String> {
        ConfigVerifier::default().verify_configuration(dir).unwrap()
    }

    #[test]
    fn test_consistent_configuration_has_no_findings() {
        let (dir, _) = security_dir(StoreType::Pkcs12, "cn=NoSQL");
        assert_eq!(verify(dir.path()), Vec::<String>::new());
    }

    #[test]
    fn test_ha_alias_mismatch() {
        let (dir, mut params) = security_dir(StoreType::Pkcs12, "cn=NoSQL");
        params.transports.ha.server_key_alias = "other".to_string();
        save_security_params(&params).unwrap();
        assert_eq!(
            verify(dir.path()),
            vec!["Key alias of internal transport server shared is not the same as HA transport other.".to_string()]
        );
    }

    #[test]
    fn test_protocol_findings() {
        let mut params = SecurityParams::default();
        params.transports.internal.client_allow_protocols = "TLSv1.1".to_string();
        params.transports.ha.allow_protocols = " , ".to_string();
        let findings = verify_params(&params);
        assert_eq!(findings.len(), 2);
        assert!(findings[0].starts_with("Problem with protocols specified for transport HA"));
        assert_eq!(
            findings[1],
            "Transport internal is not using preferred protocols TLSv1.1, the preferred protocols are TLSv1.3,TLSv1.2"
        );
    }

    #[test]
    fn test_identity_patterns() {
        assert_eq!(identity_allowed("dnmatch(CN=NoSQL)", "CN=NoSQL"), Ok(true));
        assert_eq!(identity_allowed("dnmatch(CN=NoSQL)", "CN=NoSQL, O=Example"), Ok(false));
        assert_eq!(identity_allowed("dnmatch(CN=.*)", "CN=anything"), Ok(true));
        assert!(identity_allowed("CN=NoSQL", "CN=NoSQL").unwrap_err().contains("dnmatch(<regex>)"));
        assert!(identity_allowed("dnmatch(CN=(unclosed)", "CN=NoSQL").is_err());
    }

    #[test]
    fn test_subject_not_allowed() {
        let (dir, _) = security_dir(StoreType::Pkcs12, "cn=Intruder");
        let findings = verify(dir.path());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("as 'CN=Intruder' does not match 'dnmatch(CN=NoSQL)'"));
    }

    #[test]
    fn test_missing_password_source() {
        let (dir, params) = security_dir(StoreType::Pkcs12, "cn=NoSQL");
        fs::remove_file(params.resolve("store.passwd")).unwrap();
        assert_eq!(verify(dir.path()), vec!["Unable to create keystore password source.".to_string()]);
    }

    #[test]
    fn test_missing_private_key() {
        let (dir, mut params) = security_dir(StoreType::Pkcs12, "cn=NoSQL");
        for transport in Transport::ALL {
            params.transport_mut(transport).server_key_alias = "absent".to_string();
            params.transport_mut(transport).client_key_alias = "absent".to_string();
        }
        save_security_params(&params).unwrap();
        assert_eq!(verify(dir.path()), vec!["Private key absent does not exist in the keystore.".to_string()]);
    }

    struct CaSigned {
        dir: TempDir,
        params: SecurityParams,
        ca: Vec<u8>,
        leaf_key: Vec<u8>,
        leaf: Vec<u8>,
    }

    fn ca_signed_dir() -> CaSigned {
        let mut ca_params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "Test CA");
        ca_params.distinguished_name = dn;
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_key = KeyPair::generate().unwrap();
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let mut leaf_params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "NoSQL");
        leaf_params.distinguished_name = dn;
        let leaf_key = KeyPair::generate().unwrap();
        let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

        let dir = TempDir::new().unwrap();
        let params = SecurityParams::default().with_config_dir(dir.path());
        save_security_params(&params).unwrap();
        write_password_file(&params, &SecretBuffer::from(PASSWORD)).unwrap();
        CaSigned {
            dir,
            params,
            ca: ca.der().to_vec(),
            leaf_key: leaf_key.serialize_der(),
            leaf: leaf.der().to_vec(),
        }
    }

    fn write_stores(setup: &CaSigned, trust_ca_in_keystore: bool, trust_leaf: bool) {
        let access = KeyStoreAccess::default();
        let password = SecretBuffer::from(PASSWORD);

        let mut keystore = KeyStore::new(StoreType::Pkcs12);
        keystore.insert(
            "shared",
            StoreEntry::PrivateKey {
                key: setup.leaf_key.clone(),
                chain: vec![setup.leaf.clone(), setup.ca.clone()],
            },
        );
        if trust_ca_in_keystore {
            keystore.insert("ca", StoreEntry::TrustedCertificate(setup.ca.clone()));
        }
        access.store(&keystore, setup.params.keystore_path(), Some(&password)).unwrap();

        let mut truststore = KeyStore::new(StoreType::Pkcs12);
        truststore.insert("ca", StoreEntry::TrustedCertificate(setup.ca.clone()));
        if trust_leaf {
            truststore.insert("mykey", StoreEntry::TrustedCertificate(setup.leaf.clone()));
        }
        access.store(&truststore, setup.params.truststore_path(), Some(&password)).unwrap();
    }

    #[test]
    fn test_ca_signed_chain() {
        let setup = ca_signed_dir();
        write_stores(&setup, true, true);
        assert_eq!(verify(setup.dir.path()), Vec::<String>::new());

        write_stores(&setup, true, false);
        let findings = verify(setup.dir.path());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].ends_with("must contain the certificate CN=NoSQL."));
    }

    #[test]
    fn test_untrusted_chain() {
        let setup = ca_signed_dir();
        write_stores(&setup, false, true);
        let findings = verify(setup.dir.path());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].starts_with("Problem with verifying certificate chain in keystore"));
    }

    #[test]
    fn test_unreadable_keystore_is_unexpected_error() {
        let (dir, params) = security_dir(StoreType::Pkcs12, "cn=NoSQL");
        fs::write(params.keystore_path(), b"garbage").unwrap();
        let findings = verify(dir.path());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].starts_with("Unexpected error: "));
    }

    proptest! {
        #[test]
        fn prop_lists_without_preferred_protocol_are_flagged(list in "(SSLv3|TLSv1|TLSv1\\.1)(,(SSLv3|TLSv1|TLSv1\\.1)){0,3}") {
            prop_assert_eq!(check_protocols(&list), ProtocolCheck::NotPreferred);
            let with_preferred = format!("{}, TLSv1.2", list);
            prop_assert_eq!(check_protocols(&with_preferred), ProtocolCheck::Preferred);
        }
    }
}
