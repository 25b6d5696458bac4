//! Service principal and keytab provisioning through `kadmin`.

use keyward_core::params::load_security_params;
use keyward_core::util::fs::remove_if_exists;
use keyward_core::util::make_owner_only_write_access;
use keyward_types::{bail, AdminUtility, KerberosParams, KeywardError, PasswordPrompt, Result, SecretBuffer, SecurityParams};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::kadmin::KadminSetting;

/// Default principal validity.
pub const PRINC_VALIDITY_DEFAULT: &str = "365days";

/// Default principal password expiry.
pub const PRINC_PWD_EXPIRE_DEFAULT: &str = "365days";

/// Default key-salt list for extracted keys.
pub const KEYSALT_LIST_DEFAULT: &str = "des3-cbc-sha1:normal,aes128-cts-hmac-sha1-96:normal,arcfour-hmac:normal";

/// Property naming the principal validity.
pub const PRINCIPAL_VALIDITY: &str = "krbPrincValidity";

/// Property naming the key-salt list.
pub const KEYSALT_LIST: &str = "krbKeysalt";

/// Property naming the principal password expiry.
pub const PRINCIPAL_PWD_EXPIRE: &str = "krbPrincPwdExpire";

/// Options for a new service principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalOptions {
    /// Principal expiry, in kadmin time syntax
    pub validity: String,
    /// Encryption type and salt pairs of the extracted keys
    pub keysalt_list: String,
    /// Password expiry, in kadmin time syntax
    pub password_expiry: String,
}

impl Default for PrincipalOptions {
    fn default() -> Self {
        Self {
            validity: PRINC_VALIDITY_DEFAULT.to_string(),
            keysalt_list: KEYSALT_LIST_DEFAULT.to_string(),
            password_expiry: PRINC_PWD_EXPIRE_DEFAULT.to_string(),
        }
    }
}

impl PrincipalOptions {
    /// Defaults overridden by `krbPrincValidity`, `krbKeysalt` and
    /// `krbPrincPwdExpire` properties.
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str, default: String| props.get(key).cloned().unwrap_or(default);
        Self {
            validity: get(PRINCIPAL_VALIDITY, defaults.validity),
            keysalt_list: get(KEYSALT_LIST, defaults.keysalt_list),
            password_expiry: get(PRINCIPAL_PWD_EXPIRE, defaults.password_expiry),
        }
    }
}

/// `service[/instance][@REALM]`; empty instance and realm are omitted.
pub fn canonical_principal(kerberos: &KerberosParams) -> String {
    let mut principal = kerberos.service_name.clone();
    if let Some(instance) = kerberos.instance_name.as_deref().filter(|i| !i.is_empty()) {
        principal.push('/');
        principal.push_str(instance);
    }
    if !kerberos.realm_name.is_empty() {
        principal.push('@');
        principal.push_str(&kerberos.realm_name);
    }
    principal
}

/// Creates the store's service principal and maintains its keytab.
pub struct KerberosProvisioner<A: AdminUtility, P: PasswordPrompt> {
    admin: A,
    prompt: P,
}

impl<A: AdminUtility, P: PasswordPrompt> KerberosProvisioner<A, P> {
    /// Provisioner running commands through `admin`; `prompt` supplies the
    /// admin password when the settings call for one.
    pub fn new(admin: A, prompt: P) -> Self {
        Self { admin, prompt }
    }

    /// Add the service principal and extract its keytab into `dir`.
    ///
    /// The principal is not re-added when extraction fails.
    pub fn generate_keytab_file(
        &self,
        dir: &Path,
        params: &SecurityParams,
        setting: &KadminSetting,
        options: &PrincipalOptions,
    ) -> Result<PathBuf> {
        check_enabled(setting)?;
        let keytab = dir.join(&params.kerberos.keytab_file);
        let realm = &params.kerberos.realm_name;
        let principal = canonical_principal(&params.kerberos);
        let password = self.admin_password(setting)?;

        info!("Adding principal {}", principal);
        let add = format!(
            "add_principal -expire {} -pwexpire {} -randkey \"{}\"",
            options.validity, options.password_expiry, principal
        );
        self.run_kadmin(setting, realm, &add, password.clone(), "Error adding service principal")?;

        info!("Extracting keytab {}", keytab.display());
        let extract = ktadd_query(&keytab, &options.keysalt_list, &principal);
        self.run_kadmin(setting, realm, &extract, password, "Error extracting keytab file")?;

        make_owner_only_write_access(&keytab)?;
        Ok(keytab)
    }

    /// Extract fresh keys of the service principal and replace the keytab
    /// of `dir` with them.
    ///
    /// The old keytab is removed only after the new one has been written.
    pub fn renew_keytab(&self, dir: &Path, keysalt_list: Option<&str>, setting: &KadminSetting) -> Result<PathBuf> {
        check_enabled(setting)?;
        let params = load_security_params(dir)?;
        let keytab = dir.join(&params.kerberos.keytab_file);
        if !keytab.exists() {
            bail!(Kerberos, "keytab {} does not exist", keytab.display());
        }
        let principal = canonical_principal(&params.kerberos);
        let keysalt_list = keysalt_list.unwrap_or(KEYSALT_LIST_DEFAULT);

        let staging = staging_keytab_path(dir)?;
        let result = self.replace_keytab(setting, &params, &principal, keysalt_list, &staging, &keytab);
        if let Err(e) = remove_if_exists(&staging) {
            warn!("Temporary keytab {} cannot be deleted: {}", staging.display(), e);
            result?;
            return Err(e);
        }
        result?;
        info!("Renewed keytab {}", keytab.display());
        Ok(keytab)
    }

    fn replace_keytab(
        &self,
        setting: &KadminSetting,
        params: &SecurityParams,
        principal: &str,
        keysalt_list: &str,
        staging: &Path,
        keytab: &Path,
    ) -> Result<()> {
        let password = self.admin_password(setting)?;
        let extract = ktadd_query(staging, keysalt_list, principal);
        self.run_kadmin(setting, &params.kerberos.realm_name, &extract, password, "Error extracting keytab file")?;

        fs::remove_file(keytab).map_err(|e| {
            KeywardError::Kerberos(format!("Old keytab {} cannot be deleted: {}", keytab.display(), e))
        })?;
        fs::rename(staging, keytab).map_err(|e| {
            KeywardError::Kerberos(format!(
                "keytab {} cannot be renamed as {}: {}",
                staging.display(),
                keytab.display(),
                e
            ))
        })?;
        make_owner_only_write_access(keytab)?;
        Ok(())
    }

    fn admin_password(&self, setting: &KadminSetting) -> Result<Option<SecretBuffer>> {
        if !setting.prompt_password() {
            return Ok(None);
        }
        let principal = setting.admin_principal.as_deref().unwrap_or("");
        match self.prompt.read_password(&format!("Password for {}: ", principal))? {
            Some(password) => Ok(Some(password)),
            None => bail!(Kerberos, "Failed to acquire kadmin password"),
        }
    }

    fn run_kadmin(
        &self,
        setting: &KadminSetting,
        realm: &str,
        query: &str,
        password: Option<SecretBuffer>,
        what: &str,
    ) -> Result<()> {
        let output = self.admin.run(&setting.command(realm, query), password)?;
        for line in &output.output {
            debug!("kadmin: {}", line);
        }
        if !output.success() {
            return Err(KeywardError::Kerberos(format!(
                "{}: return code {}\n{}",
                what,
                output.code,
                output.output.join("\n")
            )));
        }
        Ok(())
    }
}

fn check_enabled(setting: &KadminSetting) -> Result<()> {
    if setting.is_disabled() {
        bail!(Kerberos, "kadmin is disabled, cannot manage service principals");
    }
    setting.validate()
}

fn ktadd_query(keytab: &Path, keysalt_list: &str, principal: &str) -> String {
    format!("ktadd -k {} -e {} \"{}\"", keytab.display(), keysalt_list, principal)
}

/// A fresh, not yet existing file name in `dir` for the new keytab.
///
/// `ktadd` refuses to write into a file that is not already a keytab.
fn staging_keytab_path(dir: &Path) -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("tmp")
        .suffix(".keytab")
        .tempfile_in(dir)?;
    let path = file.path().to_path_buf();
    file.close()?;
    Ok(path)
}
