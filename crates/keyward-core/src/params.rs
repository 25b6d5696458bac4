//! Persistence of the security-parameters record and the keystore password.

use keyward_types::files::SECURITY_CONFIG_FILE;
use keyward_types::{KeywardError, Result, SecretBuffer, SecurityParams};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::util::fs::make_owner_only_write_access;

/// Path of `security.yml` inside a security directory.
pub fn security_file(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(SECURITY_CONFIG_FILE)
}

/// Load the security parameters of a directory.
///
/// Fails when the directory has no `security.yml`.
pub fn load_security_params(dir: impl AsRef<Path>) -> Result<SecurityParams> {
    let dir = dir.as_ref();
    let file = security_file(dir);
    if !file.exists() {
        return Err(KeywardError::Config(format!(
            "Security file not found in {}",
            dir.display()
        )));
    }

    let content = fs::read_to_string(&file)?;
    let params: SecurityParams = if content.trim().is_empty() {
        SecurityParams::default()
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| KeywardError::Config(format!("Failed to parse {}: {}", file.display(), e)))?
    };
    debug!("Loaded security parameters from {}", file.display());
    Ok(params.with_config_dir(dir))
}

/// Write the security parameters back to their directory.
pub fn save_security_params(params: &SecurityParams) -> Result<()> {
    let file = security_file(&params.config_dir);
    let yaml = serde_yaml::to_string(params)?;
    fs::write(&file, yaml)?;
    make_owner_only_write_access(&file)?;
    debug!("Saved security parameters to {}", file.display());
    Ok(())
}

/// Read the keystore password from the directory's password file.
///
/// Returns `Ok(None)` when no password file is configured or it does not
/// exist. The password is the first line of the file.
pub fn read_keystore_password(params: &SecurityParams) -> Result<Option<SecretBuffer>> {
    let Some(name) = params.password_file.as_deref() else {
        return Ok(None);
    };
    let path = params.resolve(name);
    if !path.exists() {
        return Ok(None);
    }

    let content = SecretBuffer::new(fs::read_to_string(&path)?);
    let password = content.expose().lines().next().unwrap_or_default();
    if password.is_empty() {
        return Ok(None);
    }
    Ok(Some(SecretBuffer::from(password)))
}

/// Store the keystore password in the directory's password file.
pub fn write_password_file(params: &SecurityParams, password: &SecretBuffer) -> Result<PathBuf> {
    let name = params.password_file.as_deref().ok_or_else(|| {
        KeywardError::Config("No password file is configured for this security directory".to_string())
    })?;
    let path = params.resolve(name);
    let mut content = SecretBuffer::new(format!("{}\n", password.expose()));
    fs::write(&path, content.expose())?;
    content.wipe();
    make_owner_only_write_access(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_types::StoreType;
    use tempfile::TempDir;

    #[test]
    fn test_missing_security_file() {
        let dir = TempDir::new().unwrap();
        let err = load_security_params(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Security file not found"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut params = SecurityParams::default().with_config_dir(dir.path());
        params.keystore_type = StoreType::Jks;
        params.transports.ha.server_key_alias = "ha-key".to_string();
        save_security_params(&params).unwrap();

        let loaded = load_security_params(dir.path()).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn test_password_file() {
        let dir = TempDir::new().unwrap();
        let params = SecurityParams::default().with_config_dir(dir.path());
        assert!(read_keystore_password(&params).unwrap().is_none());

        write_password_file(&params, &SecretBuffer::from("k3ystore!")).unwrap();
        let password = read_keystore_password(&params).unwrap().unwrap();
        assert_eq!(password.expose(), "k3ystore!");
    }
}
