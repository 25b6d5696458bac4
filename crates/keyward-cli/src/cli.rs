//! CLI structure and command definitions.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use keyward_core::config::ToolSettings;
use keyward_types::{StoreType, Transport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keyward")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Key, trust store and Kerberos credential manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tool settings file (default ~/.keyward/config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the keystore, truststore and client.trust of a security directory
    Init {
        /// Security directory
        dir: PathBuf,

        /// Generate a random keystore password instead of prompting
        #[arg(long)]
        generate_password: bool,

        /// Protect client.trust with a password (prompted)
        #[arg(long)]
        client_trust_password: bool,

        /// Certificate subject
        #[arg(long, default_value = "cn=NoSQL")]
        dname: String,

        /// Key algorithm (RSA or EC)
        #[arg(long, default_value = "RSA")]
        key_algorithm: String,

        /// Key size in bits
        #[arg(long, default_value_t = 2048)]
        key_size: u32,

        /// Certificate validity in days
        #[arg(long, default_value_t = 365)]
        validity: u32,

        /// Alias of the private key entry
        #[arg(long, default_value = "shared")]
        alias: String,

        /// Store type
        #[arg(long, default_value = "PKCS12")]
        store_type: StoreType,

        /// Extra keystore options as name=value (certFileName, keyAlias, ...)
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
    },

    /// Convert the JKS stores of a security directory to PKCS12
    #[command(name = "update-type")]
    UpdateType {
        /// Security directory
        dir: PathBuf,

        /// Target store type
        #[arg(long, default_value = "PKCS12")]
        store_type: StoreType,

        /// Protect client.trust with a password (prompted)
        #[arg(long)]
        client_trust_password: bool,
    },

    /// Merge the trusted certificates of one security directory into another
    #[command(name = "merge-trust")]
    MergeTrust {
        /// Directory whose truststore is copied
        source: PathBuf,

        /// Directory receiving the certificates
        dest: PathBuf,

        /// Protect client.trust with a password (prompted)
        #[arg(long)]
        client_trust_password: bool,
    },

    /// Check a security directory for inconsistent settings
    Verify {
        /// Security directory
        dir: PathBuf,
    },

    /// List the entries of the keystore and truststore
    Print {
        /// Security directory
        dir: PathBuf,
    },

    /// List the aliases of a single store file
    #[command(name = "list-store")]
    ListStore {
        /// Store file
        path: PathBuf,

        /// The store has no password
        #[arg(long)]
        no_password: bool,
    },

    /// Change parameters in security.yml
    #[command(name = "set-param")]
    SetParam {
        /// Security directory
        dir: PathBuf,

        /// Settings as name=value
        #[arg(required = true)]
        settings: Vec<String>,

        /// Restrict transport parameters to one transport
        #[arg(short, long)]
        transport: Option<Transport>,
    },

    /// Manage the Kerberos service keytab
    Keytab {
        #[command(subcommand)]
        command: KeytabCommands,
    },

    /// Show the default realm and KDC of a krb5.conf file
    Krb5 {
        /// Configuration file (default from tool settings)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Generate a random password
    Password {
        /// Generate a user password (12 characters, 3 of each class)
        #[arg(long)]
        user: bool,

        /// Length of a store password
        #[arg(short, long, default_value_t = 16)]
        length: usize,
    },

    /// Check whether a host refers to this machine
    #[command(name = "is-local")]
    IsLocal {
        /// Host name or address
        host: String,
    },
}

#[derive(Subcommand)]
pub enum KeytabCommands {
    /// Add the service principal and extract its keytab
    Generate {
        /// Security directory
        dir: PathBuf,

        /// Principal validity
        #[arg(long)]
        validity: Option<String>,

        /// Key-salt list
        #[arg(long)]
        keysalt: Option<String>,

        /// Principal password expiry
        #[arg(long)]
        pwexpire: Option<String>,

        #[command(flatten)]
        kadmin: KadminArgs,
    },

    /// Replace the keytab with freshly extracted keys
    Renew {
        /// Security directory
        dir: PathBuf,

        /// Key-salt list
        #[arg(long)]
        keysalt: Option<String>,

        #[command(flatten)]
        kadmin: KadminArgs,
    },
}

/// Login options for kadmin.
#[derive(Args, Debug, Clone, Default)]
pub struct KadminArgs {
    /// kadmin path (default from tool settings, NONE disables kadmin)
    #[arg(long)]
    pub kadmin_path: Option<String>,

    /// Admin principal
    #[arg(long)]
    pub admin_principal: Option<String>,

    /// Admin keytab
    #[arg(long, conflicts_with = "admin_ccache")]
    pub admin_keytab: Option<PathBuf>,

    /// Admin credential cache
    #[arg(long)]
    pub admin_ccache: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> Result<ToolSettings> {
        match &self.config {
            Some(path) => ToolSettings::load_from(path)
                .with_context(|| format!("Failed to load tool settings from {}", path.display())),
            None => ToolSettings::load().context("Failed to load tool settings"),
        }
    }

    pub fn execute(&self) -> Result<()> {
        use crate::commands::*;

        match &self.command {
            Commands::Init {
                dir,
                generate_password,
                client_trust_password,
                dname,
                key_algorithm,
                key_size,
                validity,
                alias,
                store_type,
                options,
            } => {
                let args = init::InitArgs {
                    generate_password: *generate_password,
                    client_trust_password: *client_trust_password,
                    dname: dname.clone(),
                    key_algorithm: key_algorithm.clone(),
                    key_size: *key_size,
                    validity: *validity,
                    alias: alias.clone(),
                    store_type: *store_type,
                    options: options.clone(),
                };
                init::execute(&self.settings()?, dir, &args)
            }
            Commands::UpdateType { dir, store_type, client_trust_password } => {
                stores::update_type(&self.settings()?, dir, *store_type, *client_trust_password)
            }
            Commands::MergeTrust { source, dest, client_trust_password } => {
                stores::merge_trust(&self.settings()?, source, dest, *client_trust_password)
            }
            Commands::Verify { dir } => {
                verify::execute(&self.settings()?, dir)
            }
            Commands::Print { dir } => {
                stores::print(&self.settings()?, dir)
            }
            Commands::ListStore { path, no_password } => {
                stores::list(&self.settings()?, path, *no_password)
            }
            Commands::SetParam { dir, settings, transport } => {
                params::set(&self.settings()?, dir, settings, *transport)
            }
            Commands::Keytab { command } => match command {
                KeytabCommands::Generate { dir, validity, keysalt, pwexpire, kadmin } => {
                    let options = keytab::principal_options(validity, keysalt, pwexpire);
                    keytab::generate(&self.settings()?, dir, kadmin, &options)
                }
                KeytabCommands::Renew { dir, keysalt, kadmin } => {
                    keytab::renew(&self.settings()?, dir, keysalt.as_deref(), kadmin)
                }
            },
            Commands::Krb5 { file } => {
                keytab::krb5(&self.settings()?, file.as_deref())
            }
            Commands::Password { user, length } => {
                password::execute(*user, *length)
            }
            Commands::IsLocal { host } => {
                host::is_local(host)
            }
        }
    }
}
