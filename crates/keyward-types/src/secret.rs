//! Password buffers that are wiped when they go out of scope.

use std::fmt;
use zeroize::Zeroize;

/// Character used to overwrite password contents.
const NEUTRAL: char = ' ';

/// A password held in memory only for as long as it is needed.
///
/// The contents are overwritten with spaces by [`SecretBuffer::wipe`] and
/// again when the buffer is dropped, so every exit path (early return,
/// `?`, panic unwinding) clears the secret. `Debug` never prints the value.
#[derive(Default)]
pub struct SecretBuffer {
    inner: String,
}

impl SecretBuffer {
    /// Take ownership of a password string.
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    /// Borrow the password. Callers must not copy it into long-lived storage.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Number of bytes held.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the buffer holds an empty password.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Overwrite every byte of the password with a space.
    pub fn wipe(&mut self) {
        let len = self.inner.len();
        // Zeroes the whole allocation; the refill reuses it.
        self.inner.zeroize();
        self.inner.extend(std::iter::repeat(NEUTRAL).take(len));
    }

    /// Constant-shape comparison of two optional passwords.
    ///
    /// Two absent passwords match; an absent and a present one do not.
    pub fn matches(a: Option<&SecretBuffer>, b: Option<&SecretBuffer>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                let (a, b) = (a.inner.as_bytes(), b.inner.as_bytes());
                a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
            }
            _ => false,
        }
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl Clone for SecretBuffer {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl From<String> for SecretBuffer {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretBuffer {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer(***REDACTED***)")
    }
}
