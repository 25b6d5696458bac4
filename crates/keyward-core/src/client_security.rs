//! The `client.security` properties file handed to client applications.
//!
//! It carries the client-facing transport settings and points at the derived
//! `client.trust` store rather than the server truststore.

use indexmap::IndexMap;
use keyward_types::files::{CLIENT_SECURITY_FILE, CLIENT_TRUSTSTORE_FILE};
use keyward_types::{Result, SecurityParams, StoreType, Transport};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Transport property key.
pub const TRANSPORT: &str = "keyward.transport";
/// Trust store file property key.
pub const TRUSTSTORE_FILE: &str = "keyward.ssl.trustStore";
/// Trust store type property key.
pub const TRUSTSTORE_TYPE: &str = "keyward.ssl.trustStoreType";
/// Allowed protocols property key.
pub const PROTOCOLS: &str = "keyward.ssl.protocols";
/// Server identity check property key.
pub const HOSTNAME_VERIFIER: &str = "keyward.ssl.hostnameVerifier";

const HEADER: &str = "Security property settings for communication with store servers";

/// Properties a client needs to reach the store over the client transport.
pub fn client_access_props(params: &SecurityParams, client_trust_type: Option<StoreType>) -> IndexMap<String, String> {
    let client = params.transport(Transport::Client);
    let mut props = IndexMap::new();
    props.insert(TRANSPORT.to_string(), "ssl".to_string());
    props.insert(PROTOCOLS.to_string(), client.client_allow_protocols.clone());
    props.insert(HOSTNAME_VERIFIER.to_string(), client.client_identity_allowed.clone());
    props.insert(TRUSTSTORE_FILE.to_string(), CLIENT_TRUSTSTORE_FILE.to_string());
    if let Some(store_type) = client_trust_type {
        props.insert(TRUSTSTORE_TYPE.to_string(), store_type.to_string());
    }
    props
}

/// Write `client.security` into the security directory.
pub fn write_client_security(
    params: &SecurityParams,
    dir: impl AsRef<Path>,
    client_trust_type: Option<StoreType>,
) -> Result<PathBuf> {
    let path = dir.as_ref().join(CLIENT_SECURITY_FILE);
    let props = client_access_props(params, client_trust_type);

    let mut content = format!("#{}\n#{}\n", HEADER, chrono::Utc::now().to_rfc2822());
    for (key, value) in &props {
        let _ = writeln!(content, "{}={}", key, escape(value));
    }
    fs::write(&path, content)?;
    Ok(path)
}

/// Read a properties file into an ordered map, skipping comments.
pub fn read_properties(path: impl AsRef<Path>) -> Result<IndexMap<String, String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().replace("\\\\", "\\")))
        .collect())
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\")
}
