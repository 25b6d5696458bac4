//! Kerberos service identity management.
//!
//! Principals and keytabs are administered through an [`AdminUtility`],
//! normally the `kadmin` command ([`Kadmin`]).
//!
//! [`AdminUtility`]: keyward_types::AdminUtility

pub mod kadmin;
pub mod krb5;
pub mod provisioner;

pub use kadmin::{Kadmin, KadminSetting, KADMIN_DEFAULT};
pub use krb5::Krb5Config;
pub use provisioner::{canonical_principal, KerberosProvisioner, PrincipalOptions, KEYSALT_LIST_DEFAULT};
