//! Reading the default realm and its KDC from a `krb5.conf` file.
//!
//! Only `[libdefaults] default_realm` and the `kdc` entries of `[realms]`
//! are interpreted; everything else is left to the Kerberos library that
//! later consumes the file.

use keyward_core::util::fs::slurp;
use keyward_types::{bail, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default realm and KDC of a Kerberos configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Krb5Config {
    path: PathBuf,
    default_realm: Option<String>,
    kdc: Option<String>,
}

impl Krb5Config {
    /// Configuration backed by the file at `path`, not yet parsed.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_realm: None,
            kdc: None,
        }
    }

    /// Read and parse the configuration file.
    pub fn parse_config_file(&mut self) -> Result<()> {
        let content = slurp(&self.path)?;
        self.parse_str(&content)
    }

    /// Parse configuration text.
    pub fn parse_str(&mut self, content: &str) -> Result<()> {
        let lines = logical_lines(content)?;
        let mut kdcs: HashMap<String, String> = HashMap::new();
        let mut default_realm = None;
        let mut section = String::new();
        let mut realm = String::new();

        for line in &lines {
            if line.starts_with('[') {
                section = line.to_ascii_lowercase();
                realm.clear();
                continue;
            }
            match section.as_str() {
                "[libdefaults]" => {
                    if let Some((key, value)) = split_setting(line) {
                        if key.eq_ignore_ascii_case("default_realm") {
                            default_realm = Some(unquote(value));
                        }
                    }
                }
                "[realms]" => {
                    if line.ends_with('{') {
                        if let Some((key, _)) = split_setting(line) {
                            realm = key.to_string();
                        }
                    } else if line.starts_with('}') {
                        realm.clear();
                    } else if let Some((key, value)) = split_setting(line) {
                        if key.eq_ignore_ascii_case("kdc") && !realm.is_empty() {
                            kdcs.insert(realm.clone(), unquote(value));
                        }
                    }
                }
                _ => {}
            }
        }

        self.kdc = default_realm.as_ref().and_then(|realm| kdcs.remove(realm));
        self.default_realm = default_realm;
        debug!(
            "Parsed {}: default realm {:?}, kdc {:?}",
            self.path.display(),
            self.default_realm,
            self.kdc
        );
        Ok(())
    }

    /// The `default_realm` of `[libdefaults]`.
    pub fn default_realm(&self) -> Option<&str> {
        self.default_realm.as_deref()
    }

    /// The KDC configured for the default realm.
    pub fn kdc(&self) -> Option<&str> {
        self.kdc.as_deref()
    }

    /// Path of the configuration file.
    pub fn config_file_path(&self) -> &Path {
        &self.path
    }
}

/// Trimmed non-comment, non-blank lines, with a line opening with `{`
/// joined onto the line before it.
fn logical_lines(content: &str) -> Result<Vec<String>> {
    let mut lines: Vec<String> = Vec::new();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('{') {
            match lines.last_mut() {
                Some(previous) => {
                    previous.push(' ');
                    previous.push_str(line);
                }
                None => bail!(Kerberos, "Config file should not start with \"{\""),
            }
        } else {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// `key = value` with a non-empty key.
fn split_setting(line: &str) -> Option<(&str, &str)> {
    match line.find('=') {
        Some(pos) if pos > 0 => Some((line[..pos].trim(), &line[pos + 1..])),
        _ => None,
    }
}

/// Trim, then drop one pair of matching single or double quotes.
fn unquote(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].trim().to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(content: &str) -> Krb5Config {
        let mut config = Krb5Config::new("/etc/krb5.conf");
        config.parse_str(content).unwrap();
        config
    }

    #[test]
    fn test_default_realm_and_kdc() {
        let config = parse(
            "[libdefaults]\n default_realm = EXAMPLE.COM\n[realms]\n EXAMPLE.COM = {\n  kdc = kdc.example.com\n }",
        );
        assert_eq!(config.default_realm(), Some("EXAMPLE.COM"));
        assert_eq!(config.kdc(), Some("kdc.example.com"));
    }

    #[test]
    fn test_brace_on_its_own_line() {
        let config = parse(
            "# site config\n\n[libdefaults]\n  default_realm = \"EXAMPLE.COM\"\n\n[realms]\n  OTHER.COM = {\n    kdc = kdc.other.com\n  }\n  EXAMPLE.COM =\n  {\n    kdc = 'kdc1.example.com:88'\n    kdc = kdc2.example.com\n  }\n[domain_realm]\n  .example.com = EXAMPLE.COM\n",
        );
        assert_eq!(config.default_realm(), Some("EXAMPLE.COM"));
        assert_eq!(config.kdc(), Some("kdc2.example.com"));
    }

    #[test]
    fn test_missing_default_realm() {
        let config = parse("[realms]\n EXAMPLE.COM = {\n  kdc = kdc.example.com\n }\n");
        assert_eq!(config.default_realm(), None);
        assert_eq!(config.kdc(), None);

        let config = parse("[libdefaults]\n default_realm = NOKDC.COM\n");
        assert_eq!(config.default_realm(), Some("NOKDC.COM"));
        assert_eq!(config.kdc(), None);
    }

    #[test]
    fn test_leading_brace_is_rejected() {
        let mut config = Krb5Config::new("krb5.conf");
        let err = config.parse_str("# comment\n{\n").unwrap_err();
        assert!(err.to_string().contains("should not start with"));
    }

    #[test]
    fn test_parse_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("krb5.conf");
        fs::write(&path, "[libdefaults]\ndefault_realm = LAB.LOCAL\n[realms]\nLAB.LOCAL = {\nkdc = 10.0.0.5\n}\n").unwrap();

        let mut config = Krb5Config::new(&path);
        config.parse_config_file().unwrap();
        assert_eq!(config.config_file_path(), path.as_path());
        assert_eq!(config.kdc(), Some("10.0.0.5"));

        assert!(Krb5Config::new(dir.path().join("missing")).parse_config_file().is_err());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(" \"a b\" "), "a b");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("\"mismatched'"), "\"mismatched'");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote(""), "");
    }

    proptest! {
        #[test]
        fn prop_realm_and_kdc_survive_layout(
            realm in "[A-Z]{1,8}(\\.[A-Z]{1,6}){0,2}",
            kdc in "[a-z0-9]{1,10}(\\.[a-z]{1,6}){0,2}",
            brace_on_own_line in any::<bool>(),
            quoted in any::<bool>(),
        ) {
            let value = if quoted { format!("\"{}\"", kdc) } else { kdc.clone() };
            let opener = if brace_on_own_line { "=\n{" } else { "= {" };
            let content = format!(
                "[libdefaults]\n default_realm = {realm}\n\n[realms]\n {realm} {opener}\n  kdc = {value}\n }}\n"
            );
            let config = parse(&content);
            prop_assert_eq!(config.default_realm(), Some(realm.as_str()));
            prop_assert_eq!(config.kdc(), Some(kdc.as_str()));
        }
    }
}
