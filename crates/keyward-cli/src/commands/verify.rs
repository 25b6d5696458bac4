//! Verify the security configuration of a directory.

use anyhow::{bail, Result};
use colored::Colorize;
use keyward_core::config::ToolSettings;
use keyward_secrets::{ConfigVerifier, KeyStoreAccess};
use std::path::Path;

pub fn execute(settings: &ToolSettings, dir: &Path) -> Result<()> {
    println!("{} {}", "Verifying".green().bold(), dir.display().to_string().cyan());

    let verifier = ConfigVerifier::new(KeyStoreAccess::new(settings.passwordless_pkcs12));
    let findings = verifier.verify_configuration(dir)?;
    if findings.is_empty() {
        println!("{} Security configuration is consistent", "✓".green().bold());
        return Ok(());
    }

    for finding in &findings {
        println!("{} {}", "✗".red().bold(), finding);
    }
    bail!("{} problem(s) found in {}", findings.len(), dir.display())
}
