//! Password prompts.

use anyhow::{bail, Result};
use dialoguer::Password;
use keyward_secrets::lifecycle::MIN_STORE_PASSPHRASE_LEN;
use keyward_types::{KeywardError, PasswordPrompt, SecretBuffer};

/// Reads passwords from the terminal without echo.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn read_password(&self, prompt: &str) -> keyward_types::Result<Option<SecretBuffer>> {
        let password = Password::new()
            .with_prompt(prompt.trim_end_matches([':', ' ']))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| KeywardError::Other(format!("Failed to read password: {}", e)))?;
        let password = SecretBuffer::new(password);
        Ok(if password.is_empty() { None } else { Some(password) })
    }
}

/// Prompt twice for a new store password.
pub fn new_store_password(prompt: &str) -> Result<SecretBuffer> {
    let password = Password::new()
        .with_prompt(prompt)
        .with_confirmation("Re-enter the password", "The passwords do not match")
        .interact()?;
    let password = SecretBuffer::new(password);
    if password.len() < MIN_STORE_PASSPHRASE_LEN {
        bail!("The password must be at least {} characters long", MIN_STORE_PASSPHRASE_LEN);
    }
    Ok(password)
}

/// The client.trust password, when one was asked for.
pub fn client_trust_password(wanted: bool) -> Result<Option<SecretBuffer>> {
    if !wanted {
        return Ok(None);
    }
    Ok(Some(new_store_password("Enter a password for client.trust")?))
}
