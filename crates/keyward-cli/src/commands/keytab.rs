//! Kerberos keytab and configuration commands.

use anyhow::{Context, Result};
use colored::Colorize;
use keyward_core::config::ToolSettings;
use keyward_core::params::load_security_params;
use keyward_services::{Kadmin, KadminSetting, KerberosProvisioner, Krb5Config, PrincipalOptions};
use std::path::Path;

use crate::cli::KadminArgs;
use crate::ui::prompt::TerminalPrompt;

pub fn principal_options(
    validity: &Option<String>,
    keysalt: &Option<String>,
    pwexpire: &Option<String>,
) -> PrincipalOptions {
    let defaults = PrincipalOptions::default();
    PrincipalOptions {
        validity: validity.clone().unwrap_or(defaults.validity),
        keysalt_list: keysalt.clone().unwrap_or(defaults.keysalt_list),
        password_expiry: pwexpire.clone().unwrap_or(defaults.password_expiry),
    }
}

fn kadmin_setting(settings: &ToolSettings, args: &KadminArgs) -> KadminSetting {
    KadminSetting {
        path: args.kadmin_path.clone().unwrap_or_else(|| settings.kadmin_path.clone()),
        admin_principal: args.admin_principal.clone(),
        admin_keytab: args.admin_keytab.clone(),
        admin_ccache: args.admin_ccache.clone(),
    }
}

pub fn generate(settings: &ToolSettings, dir: &Path, kadmin: &KadminArgs, options: &PrincipalOptions) -> Result<()> {
    let params = load_security_params(dir)?;
    let setting = kadmin_setting(settings, kadmin);
    let keytab = KerberosProvisioner::new(Kadmin, TerminalPrompt)
        .generate_keytab_file(dir, &params, &setting, options)
        .context("Failed to generate the service keytab")?;
    println!("{} Created keytab {}", "✓".green().bold(), keytab.display().to_string().cyan());
    Ok(())
}

pub fn renew(settings: &ToolSettings, dir: &Path, keysalt: Option<&str>, kadmin: &KadminArgs) -> Result<()> {
    let setting = kadmin_setting(settings, kadmin);
    let keytab = KerberosProvisioner::new(Kadmin, TerminalPrompt)
        .renew_keytab(dir, keysalt, &setting)
        .context("Failed to renew the service keytab")?;
    println!("{} Renewed keytab {}", "✓".green().bold(), keytab.display().to_string().cyan());
    Ok(())
}

pub fn krb5(settings: &ToolSettings, file: Option<&Path>) -> Result<()> {
    let mut config = Krb5Config::new(file.unwrap_or(settings.krb5_conf.as_path()));
    config
        .parse_config_file()
        .with_context(|| format!("Failed to parse {}", config.config_file_path().display()))?;

    println!("{}", config.config_file_path().display().to_string().cyan());
    println!("  default realm: {}", config.default_realm().unwrap_or("(none)"));
    println!("  kdc:           {}", config.kdc().unwrap_or("(none)"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kadmin_setting_falls_back_to_settings() {
        let settings = ToolSettings {
            kadmin_path: "/opt/krb5/bin/kadmin".to_string(),
            ..ToolSettings::default()
        };
        let setting = kadmin_setting(&settings, &KadminArgs::default());
        assert_eq!(setting.path, "/opt/krb5/bin/kadmin");

        let args = KadminArgs {
            kadmin_path: Some("NONE".to_string()),
            ..KadminArgs::default()
        };
        assert!(kadmin_setting(&settings, &args).is_disabled());
    }

    #[test]
    fn test_principal_options_defaults() {
        let options = principal_options(&Some("30days".to_string()), &None, &None);
        assert_eq!(options.validity, "30days");
        assert_eq!(options.keysalt_list, PrincipalOptions::default().keysalt_list);
    }
}
