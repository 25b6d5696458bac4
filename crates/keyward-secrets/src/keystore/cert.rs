//! X.509 helpers: subject formatting, chain validation and fingerprints.

use keyward_types::{KeywardError, Result};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::Path;
use x509_parser::certificate::X509Certificate;
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

/// Longest chain followed before giving up.
const MAX_CHAIN_DEPTH: usize = 8;

/// Attribute keywords understood by RFC 1779, by OID.
const RFC1779_KEYWORDS: &[(&str, &str)] = &[
    ("2.5.4.3", "CN"),
    ("2.5.4.7", "L"),
    ("2.5.4.8", "ST"),
    ("2.5.4.10", "O"),
    ("2.5.4.11", "OU"),
    ("2.5.4.6", "C"),
    ("2.5.4.9", "STREET"),
];

const SPECIAL_CHARS: &[char] = &[',', '+', '=', '<', '>', '#', ';', '\n', '"', '\\'];

/// Parse a DER certificate.
pub fn parse(der: &[u8]) -> Result<X509Certificate<'_>> {
    x509_parser::parse_x509_certificate(der)
        .map(|(_, cert)| cert)
        .map_err(|e| KeywardError::Certificate(format!("not a valid X509 certificate: {}", e)))
}

/// Read a certificate file in PEM or DER form, returning DER.
pub fn load_certificate_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let data = std::fs::read(path.as_ref())?;
    if data.starts_with(b"-----BEGIN") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(&data).map_err(|e| {
            KeywardError::Certificate(format!("{} is not a PEM certificate: {}", path.as_ref().display(), e))
        })?;
        return Ok(pem.contents);
    }
    Ok(data)
}

/// Format a name the way RFC 1779 does: least significant RDN first, comma
/// separated, multi-valued RDNs joined with ` + `.
pub fn rfc1779(name: &X509Name<'_>) -> String {
    let rdns: Vec<String> = name
        .iter()
        .map(|rdn| rdn.iter().map(format_attribute).collect::<Vec<_>>().join(" + "))
        .collect();
    rdns.into_iter().rev().collect::<Vec<_>>().join(", ")
}

fn format_attribute(atv: &AttributeTypeAndValue<'_>) -> String {
    let oid = atv.attr_type().to_id_string();
    let keyword = RFC1779_KEYWORDS
        .iter()
        .find(|(id, _)| *id == oid)
        .map(|(_, keyword)| keyword.to_string())
        .unwrap_or_else(|| format!("OID.{}", oid));

    match atv.as_str() {
        Ok(value) => format!("{}={}", keyword, quote(value)),
        Err(_) => format!("{}=#{}", keyword, hex::encode(atv.attr_value().data)),
    }
}

fn quote(value: &str) -> String {
    let needs_quotes = value.contains(SPECIAL_CHARS) || value.starts_with(' ') || value.ends_with(' ');
    if !needs_quotes {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Subject of a DER certificate in RFC 1779 form.
pub fn subject_rfc1779(der: &[u8]) -> Result<String> {
    Ok(rfc1779(parse(der)?.subject()))
}

/// Whether a certificate's subject and issuer are the same name.
pub fn is_self_signed(der: &[u8]) -> Result<bool> {
    let cert = parse(der)?;
    Ok(cert.subject().as_raw() == cert.issuer().as_raw())
}

/// SHA-256 fingerprint as colon-separated upper-case hex.
pub fn fingerprint_sha256(der: &[u8]) -> String {
    let digest = Sha256::digest(der);
    let mut out = String::with_capacity(digest.len() * 3);
    for (i, byte) in digest.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Human-readable lines describing a certificate, for store listings.
pub fn describe(der: &[u8]) -> Result<Vec<String>> {
    let cert = parse(der)?;
    let validity = cert.validity();
    Ok(vec![
        format!("Owner: {}", rfc1779(cert.subject())),
        format!("Issuer: {}", rfc1779(cert.issuer())),
        format!("Serial number: {}", cert.raw_serial_as_string()),
        format!("Valid from: {} until: {}", validity.not_before, validity.not_after),
        format!("Certificate fingerprint (SHA-256): {}", fingerprint_sha256(der)),
    ])
}

fn check_validity(cert: &X509Certificate<'_>) -> Result<()> {
    if cert.validity().is_valid() {
        Ok(())
    } else {
        Err(KeywardError::Certificate(format!(
            "certificate {} is outside its validity period",
            rfc1779(cert.subject())
        )))
    }
}

fn issued_by(cert: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
    cert.issuer().as_raw() == issuer.subject().as_raw() && cert.verify_signature(Some(issuer.public_key())).is_ok()
}

/// Build a path from `leaf` through `intermediates` to one of `anchors`,
/// checking every signature and validity period. Intermediates must carry
/// basicConstraints `CA:true`. Revocation is not checked.
pub fn validate_chain(leaf: &[u8], intermediates: &[&[u8]], anchors: &[&[u8]]) -> Result<()> {
    if anchors.iter().any(|anchor| *anchor == leaf) {
        return check_validity(&parse(leaf)?);
    }

    let anchors = anchors.iter().map(|der| parse(der)).collect::<Result<Vec<_>>>()?;
    let intermediates = intermediates.iter().map(|der| parse(der)).collect::<Result<Vec<_>>>()?;

    let leaf = parse(leaf)?;
    let mut current = &leaf;
    for _ in 0..MAX_CHAIN_DEPTH {
        check_validity(current)?;
        if let Some(anchor) = anchors.iter().find(|anchor| issued_by(current, anchor)) {
            return check_validity(anchor);
        }
        match intermediates
            .iter()
            .find(|candidate| candidate.is_ca() && issued_by(current, candidate))
        {
            Some(next) => current = next,
            None => break,
        }
    }
    Err(KeywardError::Certificate(format!(
        "no trusted certification path for {}",
        rfc1779(leaf.subject())
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::testutil;
    use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};

    fn make_ca() -> (rcgen::Certificate, KeyPair) {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "Test CA");
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        (cert, key)
    }

    fn leaf_signed_by(ca: &rcgen::Certificate, ca_key: &KeyPair) -> Vec<u8> {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, "Example, Inc");
        dn.push(DnType::CommonName, "NoSQL");
        params.distinguished_name = dn;
        let key = KeyPair::generate().unwrap();
        params.signed_by(&key, ca, ca_key).unwrap().der().to_vec()
    }

    #[test]
    fn test_rfc1779_reverses_and_quotes() {
        let (ca, ca_key) = make_ca();
        let leaf = leaf_signed_by(&ca, &ca_key);
        assert_eq!(subject_rfc1779(&leaf).unwrap(), "CN=NoSQL, O=\"Example, Inc\"");
        assert_eq!(quote(" padded"), "\" padded\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn test_self_signed_detection() {
        let (_, cert) = testutil::self_signed("NoSQL");
        assert!(is_self_signed(&cert).unwrap());
        let (ca, ca_key) = make_ca();
        assert!(!is_self_signed(&leaf_signed_by(&ca, &ca_key)).unwrap());
    }

    #[test]
    fn test_chain_to_anchor() {
        let (ca, ca_key) = make_ca();
        let leaf = leaf_signed_by(&ca, &ca_key);
        validate_chain(&leaf, &[], &[ca.der().as_ref()]).unwrap();

        let (other, _) = make_ca();
        let err = validate_chain(&leaf, &[], &[other.der().as_ref()]).unwrap_err();
        assert!(err.to_string().contains("no trusted certification path"));
    }

    fn issued_by_ca(cn: &str, is_ca: bool, issuer: &rcgen::Certificate, issuer_key: &KeyPair) -> (rcgen::Certificate, KeyPair) {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        if is_ca {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        }
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, issuer, issuer_key).unwrap();
        (cert, key)
    }

    #[test]
    fn test_chain_through_intermediate_requires_ca_flag() {
        let (root, root_key) = make_ca();

        let (intermediate, intermediate_key) = issued_by_ca("Issuing CA", true, &root, &root_key);
        let leaf = leaf_signed_by(&intermediate, &intermediate_key);
        validate_chain(&leaf, &[intermediate.der().as_ref()], &[root.der().as_ref()]).unwrap();

        let (server, server_key) = issued_by_ca("Server", false, &root, &root_key);
        let forged = leaf_signed_by(&server, &server_key);
        let err = validate_chain(&forged, &[server.der().as_ref()], &[root.der().as_ref()]).unwrap_err();
        assert!(err.to_string().contains("no trusted certification path"));
    }

    #[test]
    fn test_fingerprint_format() {
        let fingerprint = fingerprint_sha256(b"abc");
        assert_eq!(fingerprint.len(), 32 * 3 - 1);
        assert!(fingerprint.starts_with("BA:78:16:BF"));
    }

    #[test]
    fn test_garbage_is_not_a_certificate() {
        assert!(matches!(parse(b"nope"), Err(KeywardError::Certificate(_))));
    }
}
