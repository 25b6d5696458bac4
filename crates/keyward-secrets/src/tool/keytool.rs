//! `keytool` subprocess adapter.

use keyward_core::util::{redact_secrets, run};
use keyward_types::{CredentialTool, KeyPairRequest, Result, StoreHandle, ToolOutput};
use std::path::Path;
use tracing::debug;

/// Drives the JDK `keytool` command.
///
/// Passwords travel on the command line as keytool requires; they are
/// redacted from everything logged.
#[derive(Debug, Clone)]
pub struct Keytool {
    program: String,
}

impl Default for Keytool {
    fn default() -> Self {
        Self::new("keytool")
    }
}

impl Keytool {
    /// Adapter running `program` (a path or a name on `PATH`).
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn store_args(store: &StoreHandle) -> Vec<String> {
        let mut args = vec![
            "-keystore".to_string(),
            store.path.display().to_string(),
            "-storetype".to_string(),
            store.store_type.to_string(),
        ];
        if let Some(password) = store.password.as_ref().filter(|p| !p.is_empty()) {
            args.push("-storepass".to_string());
            args.push(password.expose().to_string());
        }
        args
    }

    fn invoke(&self, args: Vec<String>, stores: &[&StoreHandle]) -> Result<ToolOutput> {
        let secrets: Vec<&str> = stores
            .iter()
            .filter_map(|store| store.password.as_ref())
            .map(|password| password.expose())
            .collect();
        debug!("{} {}", self.program, redact_secrets(&args.join(" "), &secrets));

        let mut result = run(&self.program, &args)?;
        for line in result.output.iter_mut() {
            *line = redact_secrets(line, &secrets);
        }
        Ok(result)
    }
}

impl CredentialTool for Keytool {
    fn name(&self) -> &'static str {
        "keytool"
    }

    fn generate_key_pair(&self, request: &KeyPairRequest) -> Result<ToolOutput> {
        let mut args = vec!["-genkeypair".to_string()];
        args.extend(Self::store_args(&request.store));
        if let Some(password) = &request.store.password {
            args.push("-keypass".to_string());
            args.push(password.expose().to_string());
        }
        args.extend([
            "-alias".to_string(),
            request.alias.clone(),
            "-dname".to_string(),
            request.dname.clone(),
            "-keyalg".to_string(),
            request.key_algorithm.clone(),
            "-keysize".to_string(),
            request.key_size.to_string(),
            "-validity".to_string(),
            request.validity_days.to_string(),
        ]);
        self.invoke(args, &[&request.store])
    }

    fn export_certificate(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<ToolOutput> {
        let mut args = vec!["-export".to_string(), "-file".to_string(), cert_file.display().to_string()];
        args.extend(Self::store_args(store));
        args.extend(["-alias".to_string(), alias.to_string()]);
        self.invoke(args, &[store])
    }

    fn import_certificate(&self, store: &StoreHandle, alias: &str, cert_file: &Path) -> Result<ToolOutput> {
        let mut args = vec![
            "-import".to_string(),
            "-file".to_string(),
            cert_file.display().to_string(),
            "-alias".to_string(),
            alias.to_string(),
        ];
        args.extend(Self::store_args(store));
        args.push("-noprompt".to_string());
        self.invoke(args, &[store])
    }

    fn migrate_store(&self, source: &StoreHandle, dest: &StoreHandle) -> Result<ToolOutput> {
        let mut args = vec![
            "-importkeystore".to_string(),
            "-srckeystore".to_string(),
            source.path.display().to_string(),
            "-srcstoretype".to_string(),
            source.store_type.to_string(),
            "-destkeystore".to_string(),
            dest.path.display().to_string(),
            "-deststoretype".to_string(),
            dest.store_type.to_string(),
        ];
        if let Some(password) = &source.password {
            args.push("-srcstorepass".to_string());
            args.push(password.expose().to_string());
        }
        if let Some(password) = dest.password.as_ref().or(source.password.as_ref()) {
            args.push("-deststorepass".to_string());
            args.push(password.expose().to_string());
        }
        args.push("-noprompt".to_string());
        self.invoke(args, &[source, dest])
    }

    fn list_entries(&self, store: &StoreHandle) -> Result<ToolOutput> {
        let mut args = vec!["-list".to_string()];
        args.extend(Self::store_args(store));
        self.invoke(args, &[store])
    }
}
