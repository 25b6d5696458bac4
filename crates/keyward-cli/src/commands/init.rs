//! Create the stores of a security directory.

use anyhow::{Context, Result};
use colored::Colorize;
use indexmap::IndexMap;
use keyward_core::config::ToolSettings;
use keyward_core::params::{load_security_params, save_security_params, security_file, write_password_file};
use keyward_secrets::{KeyStoreOptions, SecretGenerator};
use keyward_types::{SecurityParams, StoreType};
use std::path::Path;

use crate::ui::prompt;

/// Length of generated keystore passwords.
const GENERATED_PASSWORD_LEN: usize = 16;

/// Options of `keyward init`.
pub struct InitArgs {
    pub generate_password: bool,
    pub client_trust_password: bool,
    pub dname: String,
    pub key_algorithm: String,
    pub key_size: u32,
    pub validity: u32,
    pub alias: String,
    pub store_type: StoreType,
    pub options: Vec<String>,
}

impl InitArgs {
    /// Keystore options from the flags, overridden by `-o name=value`.
    pub fn keystore_options(&self) -> Result<KeyStoreOptions> {
        let mut props = IndexMap::new();
        for option in &self.options {
            let (name, value) = option
                .split_once('=')
                .with_context(|| format!("Invalid option '{}': expected name=value", option))?;
            props.insert(name.trim().to_string(), value.trim().to_string());
        }
        let mut options = KeyStoreOptions {
            dname: self.dname.clone(),
            key_algorithm: self.key_algorithm.clone(),
            key_size: self.key_size,
            validity_days: self.validity,
            key_alias: self.alias.clone(),
            store_type: self.store_type,
            ..KeyStoreOptions::default()
        };
        options.apply_properties(&props)?;
        Ok(options)
    }
}

pub fn execute(settings: &ToolSettings, dir: &Path, args: &InitArgs) -> Result<()> {
    let options = args.keystore_options()?;

    println!("{} security directory {}", "Initializing".green().bold(), dir.display().to_string().cyan());
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut params = if security_file(dir).exists() {
        load_security_params(dir)?
    } else {
        SecurityParams::default().with_config_dir(dir)
    };
    params.keystore_type = options.store_type;
    params.truststore_type = options.store_type;

    let password = if args.generate_password {
        SecretGenerator::new().generate_keystore_password(GENERATED_PASSWORD_LEN)
    } else {
        prompt::new_store_password("Enter a password for the keystore")?
    };
    let client_trust_password = prompt::client_trust_password(args.client_trust_password)?;

    let trust = super::lifecycle(settings)
        .init_key_store(dir, &params, &password, client_trust_password.as_ref(), &options)
        .context("Failed to create the key and trust stores")?;

    save_security_params(&params)?;
    write_password_file(&params, &password)?;

    println!("{} Created {} keystore and truststore", "✓".green().bold(), options.store_type);
    if trust.fell_back {
        println!(
            "{} client.trust was written as {} because password-less PKCS12 is not supported",
            "!".yellow().bold(),
            trust.store_type
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(options: &[&str]) -> InitArgs {
        InitArgs {
            generate_password: true,
            client_trust_password: false,
            dname: "cn=NoSQL".to_string(),
            key_algorithm: "EC".to_string(),
            key_size: 256,
            validity: 365,
            alias: "shared".to_string(),
            store_type: StoreType::Pkcs12,
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_flags_and_options_combine() {
        let options = args(&["keyAlias=server", "certFileName=my.cert"]).keystore_options().unwrap();
        assert_eq!(options.key_alias, "server");
        assert_eq!(options.cert_file, "my.cert");
        assert_eq!(options.key_algorithm, "EC");
        assert_eq!(options.key_size, 256);
    }

    #[test]
    fn test_bad_option_is_rejected() {
        assert!(args(&["keyAlias"]).keystore_options().is_err());
        assert!(args(&["unknown=1"]).keystore_options().is_err());
    }

    #[test]
    fn test_init_with_generated_password() {
        let dir = tempfile::TempDir::new().unwrap();
        let sec = dir.path().join("security");
        execute(&ToolSettings::default(), &sec, &args(&[])).unwrap();

        let params = load_security_params(&sec).unwrap();
        assert!(params.keystore_path().exists());
        assert!(params.truststore_path().exists());
        assert!(params.client_truststore_path().exists());
        assert!(keyward_core::params::read_keystore_password(&params).unwrap().is_some());
    }

    #[test]
    fn test_failed_init_leaves_no_params_or_password() {
        let dir = tempfile::TempDir::new().unwrap();
        let sec = dir.path().join("security");
        let mut bad = args(&[]);
        bad.key_algorithm = "DSA".to_string();
        bad.key_size = 1024;

        assert!(execute(&ToolSettings::default(), &sec, &bad).is_err());
        assert!(!security_file(&sec).exists());
        let params = SecurityParams::default().with_config_dir(&sec);
        let password_file = params.resolve(params.password_file.as_deref().unwrap());
        assert!(!password_file.exists());
        assert!(!params.keystore_path().exists());
    }
}
