//! Edit `security.yml`.

use anyhow::Result;
use colored::Colorize;
use keyward_core::config::ToolSettings;
use keyward_types::{ParamSetting, Transport};
use std::path::Path;

pub fn set(settings: &ToolSettings, dir: &Path, assignments: &[String], transport: Option<Transport>) -> Result<()> {
    let changes = assignments
        .iter()
        .map(|s| ParamSetting::parse(s, transport))
        .collect::<keyward_types::Result<Vec<_>>>()?;
    super::lifecycle(settings).update_security_params(dir, &changes)?;
    println!("{} Updated {} parameter(s)", "✓".green().bold(), changes.len());
    Ok(())
}
