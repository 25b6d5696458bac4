//! Random password generation.

use keyward_types::SecretBuffer;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};

/// Decimal digits.
pub const DIGITS: &str = "0123456789";
/// Upper-case letters.
pub const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Lower-case letters.
pub const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
/// Special characters, including the space.
pub const SPECIAL: &str = "!#$%&'()*+,-./:; <>?@[]^_`{|}~";

/// Length of generated user passwords.
pub const USER_PASSWORD_LEN: usize = 12;

/// Characters drawn from each class for a user password.
const PER_CLASS: usize = 3;

/// Secret generator.
///
/// Draws from the operating system's random source unless constructed with
/// another RNG.
pub struct SecretGenerator<R = OsRng> {
    rng: R,
}

impl SecretGenerator<OsRng> {
    /// Generator backed by the operating system's random source.
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl Default for SecretGenerator<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + CryptoRng> SecretGenerator<R> {
    /// Generator backed by a specific RNG.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Generate a keystore password of `len` characters drawn uniformly from
    /// digits, letters, and special characters.
    pub fn generate_keystore_password(&mut self, len: usize) -> SecretBuffer {
        let all: Vec<char> = [DIGITS, UPPER, LOWER, SPECIAL].concat().chars().collect();
        let password: String = (0..len)
            .map(|_| all[self.rng.gen_range(0..all.len())])
            .collect();
        SecretBuffer::new(password)
    }

    /// Generate a 12-character user password with exactly three characters
    /// from each of the upper-case, lower-case, special, and digit classes,
    /// in shuffled order.
    pub fn generate_user_password(&mut self) -> SecretBuffer {
        let mut chars = Vec::with_capacity(USER_PASSWORD_LEN);
        for class in [UPPER, LOWER, SPECIAL, DIGITS] {
            let class: Vec<char> = class.chars().collect();
            for _ in 0..PER_CLASS {
                chars.push(class[self.rng.gen_range(0..class.len())]);
            }
        }
        chars.shuffle(&mut self.rng);

        let password = SecretBuffer::new(chars.iter().collect());
        for c in chars.iter_mut() {
            *c = ' ';
        }
        password
    }
}

/// Whether two optional passwords match: both absent, or both present and
/// equal.
pub fn passwords_match(a: Option<&SecretBuffer>, b: Option<&SecretBuffer>) -> bool {
    SecretBuffer::matches(a, b)
}
