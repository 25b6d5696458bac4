//! # Keyward Services
//!
//! Integrations with the services around a store deployment.
//!
//! This crate provides:
//! - **Kerberos**: `krb5.conf` parsing, kadmin settings and the kadmin
//!   adapter, service principal and keytab provisioning
//! - **Auth methods**: helpers over the configured authentication methods
//! - **Hosts**: whether a host name resolves only to local addresses

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod kerberos;
pub mod net;

pub use auth::{has_idcs_oauth, has_kerberos, is_idcs_oauth, is_kerberos};
pub use kerberos::{Kadmin, KadminSetting, KerberosProvisioner, Krb5Config, PrincipalOptions};
pub use net::is_local_host;
