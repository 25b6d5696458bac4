//! Helpers over configured user authentication methods.
//!
//! Method lists are either comma-separated strings ("KERBEROS,IDCSOAUTH")
//! or slices of names. Names compare case-insensitively.

use keyward_types::AuthMethod;

fn is_method(name: &str, method: AuthMethod) -> bool {
    name.parse::<AuthMethod>().map_or(false, |parsed| parsed == method)
}

/// Whether `name` names Kerberos authentication.
pub fn is_kerberos(name: &str) -> bool {
    is_method(name, AuthMethod::Kerberos)
}

/// Whether `name` names IDCS OAuth authentication.
pub fn is_idcs_oauth(name: &str) -> bool {
    is_method(name, AuthMethod::IdcsOauth)
}

/// Whether a comma-separated method list enables Kerberos.
pub fn has_kerberos(methods: &str) -> bool {
    methods.split(',').any(is_kerberos)
}

/// Whether a comma-separated method list enables IDCS OAuth.
pub fn has_idcs_oauth(methods: &str) -> bool {
    methods.split(',').any(is_idcs_oauth)
}

/// Whether a list of method names enables Kerberos.
pub fn has_kerberos_in<S: AsRef<str>>(methods: &[S]) -> bool {
    methods.iter().any(|m| is_kerberos(m.as_ref()))
}

/// Whether a list of method names enables IDCS OAuth.
pub fn has_idcs_oauth_in<S: AsRef<str>>(methods: &[S]) -> bool {
    methods.iter().any(|m| is_idcs_oauth(m.as_ref()))
}
