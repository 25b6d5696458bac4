//! The declarative security-parameters record of a security directory.
//!
//! A security directory holds exactly one keystore/truststore pair; this
//! record names those files, their store types, the per-transport TLS policy,
//! and the Kerberos service identity. It is persisted as `security.yml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::errors::{KeywardError, Result};
use crate::files;
use crate::{StoreType, Transport};

/// Default key alias shared by all transports.
pub const KEY_ALIAS_DEFAULT: &str = "shared";

/// Default allowed-identity pattern, matching the default certificate DN.
pub const IDENTITY_ALLOWED_DEFAULT: &str = "dnmatch(CN=NoSQL)";

/// Default protocol allow-list.
pub const PROTOCOLS_DEFAULT: &str = "TLSv1.3,TLSv1.2";

/// Default Kerberos service name.
pub const KRB_SERVICE_NAME_DEFAULT: &str = "keyward";

/// Security parameters of one security directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityParams {
    /// Directory the record was loaded from (not persisted)
    #[serde(skip)]
    pub config_dir: PathBuf,

    /// Server keystore file name, relative to the security directory
    #[serde(default = "default_keystore_file")]
    pub keystore_file: String,

    /// Server keystore type
    #[serde(default)]
    pub keystore_type: StoreType,

    /// Server truststore file name, relative to the security directory
    #[serde(default = "default_truststore_file")]
    pub truststore_file: String,

    /// Server truststore type
    #[serde(default)]
    pub truststore_type: StoreType,

    /// File holding the keystore password, relative to the security directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,

    /// Per-transport TLS policy
    #[serde(default)]
    pub transports: Transports,

    /// Kerberos service identity
    #[serde(default)]
    pub kerberos: KerberosParams,

    /// Enabled user authentication methods, e.g. "KERBEROS,IDCSOAUTH"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_methods: Option<String>,
}

fn default_keystore_file() -> String {
    files::KEYSTORE_FILE_DEFAULT.to_string()
}

fn default_truststore_file() -> String {
    files::TRUSTSTORE_FILE_DEFAULT.to_string()
}

impl Default for SecurityParams {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::new(),
            keystore_file: default_keystore_file(),
            keystore_type: StoreType::default(),
            truststore_file: default_truststore_file(),
            truststore_type: StoreType::default(),
            password_file: Some(files::PASSWORD_FILE_DEFAULT.to_string()),
            transports: Transports::default(),
            kerberos: KerberosParams::default(),
            auth_methods: None,
        }
    }
}

/// The three transport policies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transports {
    /// Store-internal transport
    #[serde(default)]
    pub internal: TransportParams,
    /// Client-facing transport
    #[serde(default)]
    pub client: TransportParams,
    /// HA replication transport
    #[serde(default)]
    pub ha: TransportParams,
}

/// TLS policy of a single transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportParams {
    /// Key alias presented by the server side
    #[serde(default = "default_key_alias")]
    pub server_key_alias: String,
    /// Key alias presented by the client side
    #[serde(default = "default_key_alias")]
    pub client_key_alias: String,
    /// `dnmatch(<regex>)` pattern the server accepts
    #[serde(default = "default_identity")]
    pub server_identity_allowed: String,
    /// `dnmatch(<regex>)` pattern the client accepts
    #[serde(default = "default_identity")]
    pub client_identity_allowed: String,
    /// Comma-separated protocol allow-list (both sides for HA, server side otherwise)
    #[serde(default = "default_protocols")]
    pub allow_protocols: String,
    /// Comma-separated protocol allow-list of the client side
    #[serde(default = "default_protocols")]
    pub client_allow_protocols: String,
}

fn default_key_alias() -> String {
    KEY_ALIAS_DEFAULT.to_string()
}

fn default_identity() -> String {
    IDENTITY_ALLOWED_DEFAULT.to_string()
}

fn default_protocols() -> String {
    PROTOCOLS_DEFAULT.to_string()
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            server_key_alias: default_key_alias(),
            client_key_alias: default_key_alias(),
            server_identity_allowed: default_identity(),
            client_identity_allowed: default_identity(),
            allow_protocols: default_protocols(),
            client_allow_protocols: default_protocols(),
        }
    }
}

impl TransportParams {
    /// Names of the parameters that are scoped to a transport.
    pub const PARAM_NAMES: [&'static str; 6] = [
        "serverKeyAlias",
        "clientKeyAlias",
        "serverIdentityAllowed",
        "clientIdentityAllowed",
        "allowProtocols",
        "clientAllowProtocols",
    ];

    /// Whether a parameter name is transport-scoped.
    pub fn is_transport_param(name: &str) -> bool {
        Self::PARAM_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Set a transport parameter by name.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        let slot = match name.to_ascii_lowercase().as_str() {
            "serverkeyalias" => &mut self.server_key_alias,
            "clientkeyalias" => &mut self.client_key_alias,
            "serveridentityallowed" => &mut self.server_identity_allowed,
            "clientidentityallowed" => &mut self.client_identity_allowed,
            "allowprotocols" => &mut self.allow_protocols,
            "clientallowprotocols" => &mut self.client_allow_protocols,
            _ => {
                return Err(KeywardError::Validation(format!(
                    "Unknown transport parameter: {}",
                    name
                )))
            }
        };
        *slot = value.to_string();
        Ok(())
    }
}

/// Kerberos service identity of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KerberosParams {
    /// Service name, the first principal component
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Optional instance name, usually the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    /// Realm; empty means the principal carries no realm
    #[serde(default)]
    pub realm_name: String,
    /// Service keytab file name, relative to the security directory
    #[serde(default = "default_keytab_file")]
    pub keytab_file: String,
}

fn default_service_name() -> String {
    KRB_SERVICE_NAME_DEFAULT.to_string()
}

fn default_keytab_file() -> String {
    files::KEYTAB_FILE_DEFAULT.to_string()
}

impl Default for KerberosParams {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            instance_name: None,
            realm_name: String::new(),
            keytab_file: default_keytab_file(),
        }
    }
}

/// One parameter change requested against a security directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSetting {
    /// Parameter name
    pub name: String,
    /// New value
    pub value: String,
    /// Transport the change is scoped to; `None` applies it to every transport
    pub transport: Option<Transport>,
}

impl ParamSetting {
    /// Parse `name=value`.
    pub fn parse(setting: &str, transport: Option<Transport>) -> Result<Self> {
        let (name, value) = setting.split_once('=').ok_or_else(|| {
            KeywardError::Validation(format!(
                "Invalid parameter setting '{}': expected name=value",
                setting
            ))
        })?;
        Ok(Self {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
            transport,
        })
    }
}

impl SecurityParams {
    /// Absolute path of a file named relative to the security directory.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }

    /// Path of the server keystore.
    pub fn keystore_path(&self) -> PathBuf {
        self.resolve(&self.keystore_file)
    }

    /// Path of the server truststore.
    pub fn truststore_path(&self) -> PathBuf {
        self.resolve(&self.truststore_file)
    }

    /// Path of the derived client trust store.
    pub fn client_truststore_path(&self) -> PathBuf {
        self.resolve(files::CLIENT_TRUSTSTORE_FILE)
    }

    /// Path of the Kerberos service keytab.
    pub fn keytab_path(&self) -> PathBuf {
        self.resolve(&self.kerberos.keytab_file)
    }

    /// Rebind the record to a directory.
    pub fn with_config_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Policy of one transport.
    pub fn transport(&self, transport: Transport) -> &TransportParams {
        match transport {
            Transport::Internal => &self.transports.internal,
            Transport::Client => &self.transports.client,
            Transport::Ha => &self.transports.ha,
        }
    }

    /// Mutable policy of one transport.
    pub fn transport_mut(&mut self, transport: Transport) -> &mut TransportParams {
        match transport {
            Transport::Internal => &mut self.transports.internal,
            Transport::Client => &mut self.transports.client,
            Transport::Ha => &mut self.transports.ha,
        }
    }

    /// Set a directory-wide parameter by name.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "keystore" | "keystorefile" => self.keystore_file = value.to_string(),
            "keystoretype" => self.keystore_type = value.parse()?,
            "truststore" | "truststorefile" => self.truststore_file = value.to_string(),
            "truststoretype" => self.truststore_type = value.parse()?,
            "passwordfile" => self.password_file = Some(value.to_string()),
            "krbservicename" => self.kerberos.service_name = value.to_string(),
            "krbinstancename" => {
                self.kerberos.instance_name = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "krbrealmname" => self.kerberos.realm_name = value.to_string(),
            "krbkeytab" => self.kerberos.keytab_file = value.to_string(),
            "authmethods" => self.auth_methods = Some(value.to_string()),
            _ => {
                return Err(KeywardError::Validation(format!(
                    "Unknown security parameter: {}",
                    name
                )))
            }
        }
        Ok(())
    }

    /// Apply a batch of parameter changes.
    ///
    /// Transport-scoped parameters without a transport apply to all three.
    pub fn apply_changes(&mut self, settings: &[ParamSetting]) -> Result<()> {
        for setting in settings {
            if TransportParams::is_transport_param(&setting.name) {
                match setting.transport {
                    Some(transport) => self
                        .transport_mut(transport)
                        .set_parameter(&setting.name, &setting.value)?,
                    None => {
                        for transport in Transport::ALL {
                            self.transport_mut(transport)
                                .set_parameter(&setting.name, &setting.value)?;
                        }
                    }
                }
            } else {
                self.set_parameter(&setting.name, &setting.value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_sparse_yaml() {
        let params: SecurityParams = serde_yaml::from_str("keystoreType: JKS\n").unwrap();
        assert_eq!(params.keystore_type, StoreType::Jks);
        assert_eq!(params.truststore_type, StoreType::Pkcs12);
        assert_eq!(params.keystore_file, "store.keys");
        assert_eq!(params.transports.ha.server_key_alias, "shared");
        assert_eq!(params.transports.internal.client_identity_allowed, "dnmatch(CN=NoSQL)");
    }

    #[test]
    fn test_apply_transport_param_to_all() {
        let mut params = SecurityParams::default();
        let settings = vec![ParamSetting::parse("serverKeyAlias=mykey", None).unwrap()];
        params.apply_changes(&settings).unwrap();
        for transport in Transport::ALL {
            assert_eq!(params.transport(transport).server_key_alias, "mykey");
        }
    }

    #[test]
    fn test_apply_transport_param_to_one() {
        let mut params = SecurityParams::default();
        let settings = vec![ParamSetting::parse("allowProtocols=TLSv1.2", Some(Transport::Ha)).unwrap()];
        params.apply_changes(&settings).unwrap();
        assert_eq!(params.transports.ha.allow_protocols, "TLSv1.2");
        assert_eq!(params.transports.internal.allow_protocols, PROTOCOLS_DEFAULT);
    }

    #[test]
    fn test_apply_directory_params() {
        let mut params = SecurityParams::default();
        let settings = vec![
            ParamSetting::parse("truststoreType=JKS", None).unwrap(),
            ParamSetting::parse("krbRealmName=EXAMPLE.COM", None).unwrap(),
        ];
        params.apply_changes(&settings).unwrap();
        assert_eq!(params.truststore_type, StoreType::Jks);
        assert_eq!(params.kerberos.realm_name, "EXAMPLE.COM");

        let bad = vec![ParamSetting::parse("noSuchParam=1", None).unwrap()];
        assert!(params.apply_changes(&bad).is_err());
        assert!(ParamSetting::parse("missing-equals", None).is_err());
    }

    #[test]
    fn test_paths_resolve_against_dir() {
        let params = SecurityParams::default().with_config_dir("/sec");
        assert_eq!(params.keystore_path(), PathBuf::from("/sec/store.keys"));
        assert_eq!(params.client_truststore_path(), PathBuf::from("/sec/client.trust"));
    }
}
