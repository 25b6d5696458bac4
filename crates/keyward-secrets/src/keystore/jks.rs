//! Java KeyStore (JKS) codec.
//!
//! File layout (all integers big-endian):
//!
//! ```text
//! magic 0xFEEDFEED | version 2 | entry count
//! per entry: tag (1 = private key, 2 = trusted cert) | alias | timestamp ms
//!   tag 1: protected key (u32 len + bytes) | chain count | certs
//!   tag 2: cert
//! cert: type "X.509" | u32 len + DER
//! trailer: SHA-1(password as UTF-16BE | "Mighty Aphrodite" | everything above)
//! ```
//!
//! Private keys are wrapped in an `EncryptedPrivateKeyInfo` using the JDK
//! key protector: `salt(20) | key XOR keystream | SHA-1(password | key)`,
//! where the keystream is the chain of `SHA-1(password | previous)` blocks
//! seeded with the salt.

use keyward_types::{KeywardError, Result, SecretBuffer, StoreType};
use rand::RngCore;
use sha1::{Digest, Sha1};

use super::{KeyStore, StoreEntry};

const MAGIC: u32 = 0xFEED_FEED;
const VERSION_1: u32 = 1;
const VERSION_2: u32 = 2;
const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;
const CERT_TYPE: &str = "X.509";
const INTEGRITY_SALT: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;
const SALT_LEN: usize = 20;

/// OID 1.3.6.1.4.1.42.2.17.1.1, the JDK key protector.
const KEY_PROTECTOR_OID: [u8; 10] = [0x2b, 0x06, 0x01, 0x04, 0x01, 0x2a, 0x02, 0x11, 0x01, 0x01];

const DER_SEQUENCE: u8 = 0x30;
const DER_OCTET_STRING: u8 = 0x04;
const DER_OID: u8 = 0x06;
const DER_NULL: u8 = 0x05;

/// Whether data starts with the JKS magic number.
pub fn has_magic(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == MAGIC.to_be_bytes()
}

fn invalid(what: &str) -> KeywardError {
    KeywardError::Store(format!("Invalid JKS data: {}", what))
}

/// Password characters as UTF-16BE bytes, wiped on drop.
struct PasswordBytes(Vec<u8>);

impl PasswordBytes {
    fn new(password: &SecretBuffer) -> Self {
        Self(password.expose().encode_utf16().flat_map(u16::to_be_bytes).collect())
    }
}

impl Drop for PasswordBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

fn integrity_digest(password: &PasswordBytes, body: &[u8]) -> [u8; DIGEST_LEN] {
    Sha1::new()
        .chain_update(&password.0)
        .chain_update(INTEGRITY_SALT)
        .chain_update(body)
        .finalize()
        .into()
}

/// Decode a JKS file, verifying its integrity digest.
pub fn decode(data: &[u8], password: &SecretBuffer) -> Result<KeyStore> {
    if data.len() < 12 + DIGEST_LEN {
        return Err(invalid("file too short"));
    }
    let password = PasswordBytes::new(password);
    let (body, trailer) = data.split_at(data.len() - DIGEST_LEN);
    if integrity_digest(&password, body)[..] != trailer[..] {
        return Err(KeywardError::Store(
            "Keystore was tampered with, or password was incorrect".to_string(),
        ));
    }

    let mut reader = Reader::new(body);
    if reader.u32()? != MAGIC {
        return Err(invalid("bad magic number"));
    }
    let version = reader.u32()?;
    if version != VERSION_1 && version != VERSION_2 {
        return Err(invalid(&format!("unsupported version {}", version)));
    }

    let count = reader.u32()?;
    let mut store = KeyStore::new(StoreType::Jks);
    for _ in 0..count {
        let tag = reader.u32()?;
        let alias = reader.utf()?;
        let _timestamp = reader.u64()?;
        let entry = match tag {
            TAG_PRIVATE_KEY => {
                let len = reader.u32()? as usize;
                let key = recover_key(reader.bytes(len)?, &password)?;
                let chain_len = reader.u32()?;
                let chain = (0..chain_len)
                    .map(|_| reader.certificate(version))
                    .collect::<Result<Vec<_>>>()?;
                StoreEntry::PrivateKey { key, chain }
            }
            TAG_TRUSTED_CERT => StoreEntry::TrustedCertificate(reader.certificate(version)?),
            other => return Err(invalid(&format!("unknown entry tag {}", other))),
        };
        store.insert(&alias, entry);
    }
    Ok(store)
}

/// Encode a store as JKS, protecting keys with the store password.
pub fn encode(store: &KeyStore, password: &SecretBuffer) -> Result<Vec<u8>> {
    let password = PasswordBytes::new(password);
    let timestamp = chrono::Utc::now().timestamp_millis().max(0) as u64;

    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&VERSION_2.to_be_bytes());
    out.extend_from_slice(&(store.len() as u32).to_be_bytes());

    for (alias, entry) in store.entries() {
        match entry {
            StoreEntry::PrivateKey { key, chain } => {
                out.extend_from_slice(&TAG_PRIVATE_KEY.to_be_bytes());
                write_utf(&mut out, alias)?;
                out.extend_from_slice(&timestamp.to_be_bytes());
                let protected = protect_key(key, &password);
                out.extend_from_slice(&(protected.len() as u32).to_be_bytes());
                out.extend_from_slice(&protected);
                out.extend_from_slice(&(chain.len() as u32).to_be_bytes());
                for cert in chain {
                    write_certificate(&mut out, cert)?;
                }
            }
            StoreEntry::TrustedCertificate(cert) => {
                out.extend_from_slice(&TAG_TRUSTED_CERT.to_be_bytes());
                write_utf(&mut out, alias)?;
                out.extend_from_slice(&timestamp.to_be_bytes());
                write_certificate(&mut out, cert)?;
            }
        }
    }

    let digest = integrity_digest(&password, &out);
    out.extend_from_slice(&digest);
    Ok(out)
}

fn keystream(password: &PasswordBytes, salt: &[u8], len: usize) -> Vec<u8> {
    let mut stream = Vec::with_capacity(len + DIGEST_LEN);
    let mut digest = salt.to_vec();
    while stream.len() < len {
        digest = Sha1::new()
            .chain_update(&password.0)
            .chain_update(&digest)
            .finalize()
            .to_vec();
        stream.extend_from_slice(&digest);
    }
    stream.truncate(len);
    stream
}

fn key_check(password: &PasswordBytes, key: &[u8]) -> [u8; DIGEST_LEN] {
    Sha1::new().chain_update(&password.0).chain_update(key).finalize().into()
}

fn protect_key(key: &[u8], password: &PasswordBytes) -> Vec<u8> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let stream = keystream(password, &salt, key.len());
    let mut protected = Vec::with_capacity(SALT_LEN + key.len() + DIGEST_LEN);
    protected.extend_from_slice(&salt);
    protected.extend(key.iter().zip(&stream).map(|(k, s)| k ^ s));
    protected.extend_from_slice(&key_check(password, key));

    let mut algorithm = der_tlv(DER_OID, &KEY_PROTECTOR_OID);
    algorithm.extend_from_slice(&der_tlv(DER_NULL, &[]));
    let mut info = der_tlv(DER_SEQUENCE, &algorithm);
    info.extend_from_slice(&der_tlv(DER_OCTET_STRING, &protected));
    der_tlv(DER_SEQUENCE, &info)
}

fn recover_key(encrypted_info: &[u8], password: &PasswordBytes) -> Result<Vec<u8>> {
    let (info, _) = read_tlv(encrypted_info, DER_SEQUENCE)?;
    let (algorithm, rest) = read_tlv(info, DER_SEQUENCE)?;
    let (oid, _) = read_tlv(algorithm, DER_OID)?;
    if oid != KEY_PROTECTOR_OID {
        return Err(KeywardError::Unsupported(
            "private key protected with an unsupported algorithm".to_string(),
        ));
    }
    let (protected, _) = read_tlv(rest, DER_OCTET_STRING)?;
    if protected.len() < SALT_LEN + DIGEST_LEN {
        return Err(invalid("protected key too short"));
    }

    let (salt, rest) = protected.split_at(SALT_LEN);
    let (cipher, check) = rest.split_at(rest.len() - DIGEST_LEN);
    let stream = keystream(password, salt, cipher.len());
    let key: Vec<u8> = cipher.iter().zip(&stream).map(|(c, s)| c ^ s).collect();
    if key_check(password, &key)[..] != check[..] {
        return Err(KeywardError::Store("Cannot recover key".to_string()));
    }
    Ok(key)
}

fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}

/// Split one TLV with the expected tag off the front of `input`.
fn read_tlv(input: &[u8], tag: u8) -> Result<(&[u8], &[u8])> {
    let (&actual, rest) = input.split_first().ok_or_else(|| invalid("truncated DER"))?;
    if actual != tag {
        return Err(invalid(&format!("expected DER tag {:#04x}, found {:#04x}", tag, actual)));
    }
    let (&first, rest) = rest.split_first().ok_or_else(|| invalid("truncated DER"))?;
    let (len, rest) = if first < 0x80 {
        (first as usize, rest)
    } else {
        let n = (first & 0x7f) as usize;
        if n == 0 || n > 4 || rest.len() < n {
            return Err(invalid("bad DER length"));
        }
        let len = rest[..n].iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, &rest[n..])
    };
    if rest.len() < len {
        return Err(invalid("truncated DER"));
    }
    Ok(rest.split_at(len))
}

fn write_certificate(out: &mut Vec<u8>, der: &[u8]) -> Result<()> {
    write_utf(out, CERT_TYPE)?;
    out.extend_from_slice(&(der.len() as u32).to_be_bytes());
    out.extend_from_slice(der);
    Ok(())
}

/// Java `writeUTF`: u16 byte length, then modified UTF-8 over UTF-16 units.
fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let mut encoded = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007f => encoded.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                encoded.push(0xc0 | (unit >> 6) as u8);
                encoded.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                encoded.push(0xe0 | (unit >> 12) as u8);
                encoded.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                encoded.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    let len = u16::try_from(encoded.len()).map_err(|_| invalid("string too long"))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        let end = end.ok_or_else(|| invalid("truncated"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    fn utf(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.bytes(len)?;
        let mut units = Vec::with_capacity(len);
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i] as u16;
            let (unit, width) = if b & 0x80 == 0 {
                (b, 1)
            } else if b & 0xe0 == 0xc0 && i + 1 < bytes.len() {
                (((b & 0x1f) << 6) | (bytes[i + 1] as u16 & 0x3f), 2)
            } else if b & 0xf0 == 0xe0 && i + 2 < bytes.len() {
                (
                    ((b & 0x0f) << 12) | ((bytes[i + 1] as u16 & 0x3f) << 6) | (bytes[i + 2] as u16 & 0x3f),
                    3,
                )
            } else {
                return Err(invalid("malformed string"));
            };
            units.push(unit);
            i += width;
        }
        String::from_utf16(&units).map_err(|_| invalid("malformed string"))
    }

    fn certificate(&mut self, version: u32) -> Result<Vec<u8>> {
        if version == VERSION_2 {
            let cert_type = self.utf()?;
            if cert_type != CERT_TYPE {
                return Err(KeywardError::Unsupported(format!(
                    "certificate type {} in JKS store",
                    cert_type
                )));
            }
        }
        let len = self.u32()? as usize;
        Ok(self.bytes(len)?.to_vec())
    }
}
