//! Generate passwords.

use anyhow::{bail, Result};
use keyward_secrets::SecretGenerator;

pub fn execute(user: bool, length: usize) -> Result<()> {
    let mut generator = SecretGenerator::new();
    let password = if user {
        generator.generate_user_password()
    } else {
        if length == 0 {
            bail!("The password length must be positive");
        }
        generator.generate_keystore_password(length)
    };
    println!("{}", password.expose());
    Ok(())
}
