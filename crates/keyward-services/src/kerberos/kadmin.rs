//! Connection settings for the Kerberos `kadmin` utility and the adapter
//! that runs it.

use keyward_core::util::run_with_password;
use keyward_types::{bail, bug, AdminUtility, Result, SecretBuffer, ToolOutput};
use std::path::PathBuf;
use tracing::info;

/// Default location of the `kadmin` utility.
pub const KADMIN_DEFAULT: &str = "/usr/kerberos/sbin/kadmin";

/// Path value that disables kadmin.
pub const NO_KADMIN: &str = "NONE";

/// How to reach and authenticate to `kadmin`.
///
/// The admin authenticates with a keytab plus principal, a credential cache,
/// or a password prompted for interactively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KadminSetting {
    /// Path of the `kadmin` utility, or `NONE`
    pub path: String,
    /// Admin principal
    pub admin_principal: Option<String>,
    /// Admin keytab file
    pub admin_keytab: Option<PathBuf>,
    /// Admin credential cache
    pub admin_ccache: Option<PathBuf>,
}

impl Default for KadminSetting {
    fn default() -> Self {
        Self {
            path: KADMIN_DEFAULT.to_string(),
            admin_principal: None,
            admin_keytab: None,
            admin_ccache: None,
        }
    }
}

impl KadminSetting {
    /// Set the `kadmin` path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the admin principal.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.admin_principal = Some(principal.into());
        self
    }

    /// Set the admin keytab.
    pub fn with_keytab(mut self, keytab: impl Into<PathBuf>) -> Self {
        self.admin_keytab = Some(keytab.into());
        self
    }

    /// Set the admin credential cache.
    pub fn with_ccache(mut self, ccache: impl Into<PathBuf>) -> Self {
        self.admin_ccache = Some(ccache.into());
        self
    }

    /// Whether kadmin is disabled.
    pub fn is_disabled(&self) -> bool {
        self.path.eq_ignore_ascii_case(NO_KADMIN)
    }

    /// Check the settings describe exactly one usable login.
    pub fn validate(&self) -> Result<()> {
        if self.is_disabled() {
            return Ok(());
        }

        if let Some(keytab) = &self.admin_keytab {
            if self.admin_ccache.is_some() {
                bail!(Validation, "cannot use admin keytab and credential cache together");
            }
            if self.admin_principal.is_none() {
                bail!(Validation, "must specify admin principal when using keytab file");
            }
            if !keytab.exists() {
                bail!(Validation, "keytab file {} does not exist", keytab.display());
            }
        }

        if let Some(ccache) = &self.admin_ccache {
            if !ccache.exists() {
                bail!(Validation, "credential cache {} does not exist", ccache.display());
            }
        }

        if self.prompt_password() && self.admin_principal.is_none() {
            bail!(Validation, "use kadmin with password must specify principal name");
        }
        Ok(())
    }

    /// Whether the admin logs in with a keytab.
    pub fn use_keytab(&self) -> bool {
        self.admin_keytab.is_some() && self.admin_principal.is_some() && self.admin_ccache.is_none()
    }

    /// Whether the admin logs in with a credential cache.
    pub fn use_ccache(&self) -> bool {
        self.admin_ccache.is_some() && self.admin_keytab.is_none()
    }

    /// Whether the admin password must be prompted for.
    pub fn prompt_password(&self) -> bool {
        self.admin_ccache.is_none() && self.admin_keytab.is_none()
    }

    /// Command vector running `query` against `realm`:
    /// `kadmin [-r <realm>] [-k -t <keytab>] [-c <ccache>] [-p <principal>] -q <query>`.
    pub fn command(&self, realm: &str, query: &str) -> Vec<String> {
        let mut args = vec![self.path.clone()];
        if !realm.is_empty() {
            args.extend(["-r".to_string(), realm.to_string()]);
        }
        let principal = self.admin_principal.as_deref().unwrap_or("");

        if let (true, Some(keytab)) = (self.use_keytab(), &self.admin_keytab) {
            args.extend(["-k".to_string(), "-t".to_string(), keytab.display().to_string()]);
            info!("Login Kerberos admin via keytab {} with {}", keytab.display(), principal);
        } else if let (true, Some(ccache)) = (self.use_ccache(), &self.admin_ccache) {
            args.extend(["-c".to_string(), ccache.display().to_string()]);
            info!("Login Kerberos admin via credential cache {} with {}", ccache.display(), principal);
        }

        if let Some(principal) = &self.admin_principal {
            args.extend(["-p".to_string(), principal.clone()]);
        }
        args.extend(["-q".to_string(), query.to_string()]);
        args
    }
}

/// Runs `kadmin` command vectors as a subprocess.
///
/// The first element of the vector is the program. Output is stdout
/// followed by stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kadmin;

impl AdminUtility for Kadmin {
    fn run(&self, args: &[String], password: Option<SecretBuffer>) -> Result<ToolOutput> {
        let Some((program, rest)) = args.split_first() else {
            bug!("empty kadmin command");
        };
        run_with_password(program, rest, password)
    }
}
