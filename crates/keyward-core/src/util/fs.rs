//! Filesystem utilities.
//!
//! Every file keyward writes into a security directory holds key material or
//! passwords, so it is restricted to its owner after it is written.

use keyward_types::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Expand path with tilde.
pub fn expand_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }

    path.to_path_buf()
}

/// Read entire file as string.
pub fn slurp(path: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(path).map_err(Into::into)
}

/// Restrict a file or directory so only its owner can access it.
///
/// Returns `Ok(false)` when the path does not exist.
pub fn make_owner_access_only(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    restrict_to_owner(path)?;
    Ok(true)
}

/// Restrict a file or directory so only its owner can write to it.
///
/// On Unix this is the same owner-only mode as [`make_owner_access_only`];
/// elsewhere the file is marked read-only. Returns `Ok(false)` when the path
/// does not exist.
pub fn make_owner_only_write_access(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    #[cfg(unix)]
    restrict_to_owner(path)?;
    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(path, perms)?;
    }
    Ok(true)
}

/// Copy `src` to `dest`, then restrict `dest` to owner-only write access.
pub fn copy_owner_write_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let (src, dest) = (src.as_ref(), dest.as_ref());
    // A read-only destination left by an earlier hardening would refuse the copy.
    #[cfg(not(unix))]
    if dest.exists() {
        let mut perms = fs::metadata(dest)?.permissions();
        perms.set_readonly(false);
        fs::set_permissions(dest, perms)?;
    }
    fs::copy(src, dest)?;
    make_owner_only_write_access(dest)?;
    debug!("Copied {} to {}", src.display(), dest.display());
    Ok(())
}

/// Remove a file, treating a missing file as already removed.
pub fn remove_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if path.is_dir() { 0o700 } else { 0o600 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_owner(path: &Path) -> Result<()> {
    debug!("Owner-only access is not enforced on this platform for {}", path.display());
    Ok(())
}
