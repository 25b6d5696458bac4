//! Common enumerations used throughout keyward.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::errors::{KeywardError, Result};

/// Log level enumeration for the logging system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// No logging
    None,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Detailed trace messages
    Trace,
}

impl FromStr for LogLevel {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(LogLevel::None),
            "ERROR" => Ok(LogLevel::Error),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "TRACE" => Ok(LogLevel::Trace),
            _ => Err(KeywardError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::None => write!(f, "NONE"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Trace => write!(f, "TRACE"),
        }
    }
}

/// Key/trust store formats understood by keyward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StoreType {
    /// PKCS#12 / PFX store (the default for new stores)
    #[default]
    #[serde(rename = "PKCS12", alias = "pkcs12", alias = "Pkcs12")]
    Pkcs12,
    /// Legacy Java KeyStore format
    #[serde(rename = "JKS", alias = "jks", alias = "Jks")]
    Jks,
}

impl StoreType {
    /// Standard name of the store type.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Pkcs12 => "PKCS12",
            StoreType::Jks => "JKS",
        }
    }

    /// Whether a store of this type would be written without a password.
    ///
    /// Only PKCS12 stores can be password-less; an empty password counts as
    /// no password.
    pub fn is_passwordless(&self, password: Option<&crate::SecretBuffer>) -> bool {
        *self == StoreType::Pkcs12 && password.map_or(true, |p| p.is_empty())
    }
}

impl FromStr for StoreType {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "PKCS12" => Ok(StoreType::Pkcs12),
            "JKS" => Ok(StoreType::Jks),
            _ => Err(KeywardError::Validation(format!(
                "Unsupported store type '{}': must be PKCS12 or JKS",
                s
            ))),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical transports whose security settings are kept in the parameters record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Store-internal (server to server) transport
    Internal,
    /// Client-facing transport
    Client,
    /// High-availability replication transport
    Ha,
}

impl Transport {
    /// All transports, in the order they are reported.
    pub const ALL: [Transport; 3] = [Transport::Internal, Transport::Client, Transport::Ha];
}

impl FromStr for Transport {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "internal" => Ok(Transport::Internal),
            "client" => Ok(Transport::Client),
            "ha" | "je-ha" => Ok(Transport::Ha),
            _ => Err(KeywardError::Validation(format!("Unknown transport: {}", s))),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Internal => write!(f, "internal"),
            Transport::Client => write!(f, "client"),
            Transport::Ha => write!(f, "ha"),
        }
    }
}

/// User authentication methods a store can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthMethod {
    /// Kerberos (GSSAPI) authentication
    Kerberos,
    /// IDCS OAuth bearer tokens
    IdcsOauth,
}

impl AuthMethod {
    /// Configuration name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Kerberos => "KERBEROS",
            AuthMethod::IdcsOauth => "IDCSOAUTH",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "KERBEROS" => Ok(AuthMethod::Kerberos),
            "IDCSOAUTH" => Ok(AuthMethod::IdcsOauth),
            _ => Err(KeywardError::Validation(format!("Unknown auth method: {}", s))),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecretBuffer;

    #[test]
    fn test_store_type_parsing() {
        assert_eq!("PKCS12".parse::<StoreType>().unwrap(), StoreType::Pkcs12);
        assert_eq!("pkcs12".parse::<StoreType>().unwrap(), StoreType::Pkcs12);
        assert_eq!(" jks ".parse::<StoreType>().unwrap(), StoreType::Jks);
        assert!("JCEKS".parse::<StoreType>().is_err());
    }

    #[test]
    fn test_store_type_serde_names() {
        let parsed: StoreType = serde_yaml::from_str("jks").unwrap();
        assert_eq!(parsed, StoreType::Jks);
        assert_eq!(serde_yaml::to_string(&StoreType::Pkcs12).unwrap().trim(), "PKCS12");
    }

    #[test]
    fn test_passwordless_only_for_pkcs12() {
        let empty = SecretBuffer::from("");
        let set = SecretBuffer::from("secret");
        assert!(StoreType::Pkcs12.is_passwordless(None));
        assert!(StoreType::Pkcs12.is_passwordless(Some(&empty)));
        assert!(!StoreType::Pkcs12.is_passwordless(Some(&set)));
        assert!(!StoreType::Jks.is_passwordless(None));
    }

    #[test]
    fn test_transport_round_trip_names() {
        for transport in Transport::ALL {
            assert_eq!(transport.to_string().parse::<Transport>().unwrap(), transport);
        }
        assert_eq!("je-ha".parse::<Transport>().unwrap(), Transport::Ha);
    }

    #[test]
    fn test_auth_method_parsing() {
        assert_eq!(" kerberos".parse::<AuthMethod>().unwrap(), AuthMethod::Kerberos);
        assert_eq!("IdcsOAuth".parse::<AuthMethod>().unwrap(), AuthMethod::IdcsOauth);
        assert!("password".parse::<AuthMethod>().is_err());
    }
}
