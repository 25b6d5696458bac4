//! Host locality check.

use anyhow::{bail, Result};
use colored::Colorize;
use keyward_services::is_local_host;

pub fn is_local(host: &str) -> Result<()> {
    if !is_local_host(host) {
        bail!("{} is not a local host", host);
    }
    println!("{} {} is local", "✓".green().bold(), host.cyan());
    Ok(())
}
