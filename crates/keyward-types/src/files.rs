//! Well-known file names inside a security directory.

/// Declarative security-parameters record.
pub const SECURITY_CONFIG_FILE: &str = "security.yml";

/// Trust store handed to client applications, derived from the server truststore.
pub const CLIENT_TRUSTSTORE_FILE: &str = "client.trust";

/// Properties file clients use to connect to the store.
pub const CLIENT_SECURITY_FILE: &str = "client.security";

/// Default server keystore file name.
pub const KEYSTORE_FILE_DEFAULT: &str = "store.keys";

/// Default server truststore file name.
pub const TRUSTSTORE_FILE_DEFAULT: &str = "store.trust";

/// Default keystore password file name.
pub const PASSWORD_FILE_DEFAULT: &str = "store.passwd";

/// Default Kerberos service keytab file name.
pub const KEYTAB_FILE_DEFAULT: &str = "store.keytab";

/// Suffix of backups made before a store is rewritten.
pub const BACKUP_FILE_SUFFIX: &str = ".old";

/// Suffix of the staging copy written during client-trust regeneration.
pub const STAGING_FILE_SUFFIX: &str = ".new";

/// Scratch certificate used while copying certificates between stores.
pub const TEMP_CERT_FILE: &str = "temp.cert";

/// Append a suffix to a file name (`store.trust` + `.old`).
pub fn with_suffix(name: &str, suffix: &str) -> String {
    format!("{}{}", name, suffix)
}
