//! Store maintenance commands.

use anyhow::{Context, Result};
use colored::Colorize;
use keyward_core::config::ToolSettings;
use keyward_secrets::TrustMerger;
use keyward_types::{PasswordPrompt, StoreType};
use std::path::Path;

use crate::ui::prompt::{self, TerminalPrompt};

pub fn update_type(settings: &ToolSettings, dir: &Path, target: StoreType, client_trust_password: bool) -> Result<()> {
    let client_trust_password = prompt::client_trust_password(client_trust_password)?;
    super::lifecycle(settings)
        .update_key_store_type(dir, target, client_trust_password.as_ref())
        .with_context(|| format!("Failed to update the stores of {} to {}", dir.display(), target))?;
    println!("{} Stores of {} are now {}", "✓".green().bold(), dir.display(), target);
    Ok(())
}

pub fn merge_trust(settings: &ToolSettings, source: &Path, dest: &Path, client_trust_password: bool) -> Result<()> {
    let client_trust_password = prompt::client_trust_password(client_trust_password)?;
    let lifecycle = super::lifecycle(settings);
    let added = TrustMerger::new(&lifecycle)
        .merge_trust(source, dest, client_trust_password.as_ref())
        .with_context(|| format!("Failed to merge trust from {} into {}", source.display(), dest.display()))?;

    println!(
        "{} Merged {} certificate(s) into {}",
        "✓".green().bold(),
        added.len(),
        dest.display().to_string().cyan()
    );
    for alias in added {
        println!("  {}", alias);
    }
    Ok(())
}

pub fn print(settings: &ToolSettings, dir: &Path) -> Result<()> {
    let listing = super::lifecycle(settings).print_key_stores(dir)?;
    println!("{}", listing);
    Ok(())
}

pub fn list(settings: &ToolSettings, path: &Path, no_password: bool) -> Result<()> {
    let password = if no_password {
        None
    } else {
        TerminalPrompt.read_password(&format!("Password for {}: ", path.display()))?
    };
    let aliases = super::lifecycle(settings)
        .list_key_store(path, password.as_ref())
        .with_context(|| format!("Failed to read {}", path.display()))?;

    println!("{} {} entr{}", path.display().to_string().cyan(), aliases.len(), if aliases.len() == 1 { "y" } else { "ies" });
    for alias in aliases {
        println!("  {}", alias);
    }
    Ok(())
}
