//! Enable flag lookup
//!
//! The flag itself lives in an external key-value store. The subsystem only
//! asks for one boolean, once, during init.

/// Key of the persisted enable flag
pub const ENABLE_KEY: &str = "coredump.enable";

/// Read-only view of a key-value configuration service
pub trait ConfigStore {
    /// Boolean value of `key`, `None` when unset or unparsable
    fn get_bool(&self, key: &str) -> Option<bool>;
}

/// Whether capture is enabled; an unset flag means disabled
pub fn is_enabled<C: ConfigStore + ?Sized>(config: &C) -> bool {
    config.get_bool(ENABLE_KEY).unwrap_or(false)
}

/// Fixed answer for every key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticConfig(pub bool);

impl ConfigStore for StaticConfig {
    fn get_bool(&self, _key: &str) -> Option<bool> {
        Some(self.0)
    }
}

/// Parse a property value: integers > 0 and `true`/`yes`/`on` are true
#[cfg_attr(not(feature = "std"), allow(dead_code))]
fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n > 0);
    }
    if ["true", "yes", "on"].iter().any(|t| value.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if ["false", "no", "off"].iter().any(|f| value.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

#[cfg(feature = "std")]
pub use self::property::PropertyFile;

#[cfg(feature = "std")]
mod property {
    use super::{parse_bool, ConfigStore};
    use std::collections::BTreeMap;
    use std::io;
    use std::path::Path;

    /// `key=value` property file, `#` starts a comment line
    #[derive(Debug, Clone, Default)]
    pub struct PropertyFile {
        entries: BTreeMap<String, String>,
    }

    impl PropertyFile {
        /// Load from disk; a missing file yields an empty store
        pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
            match std::fs::read_to_string(path) {
                Ok(text) => Ok(Self::parse(&text)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
                Err(e) => Err(e),
            }
        }

        /// Parse property text
        pub fn parse(text: &str) -> Self {
            let entries = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .filter_map(|line| line.split_once('='))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect();
            Self { entries }
        }

        /// Raw value of `key`
        pub fn get(&self, key: &str) -> Option<&str> {
            self.entries.get(key).map(String::as_str)
        }
    }

    impl ConfigStore for PropertyFile {
        fn get_bool(&self, key: &str) -> Option<bool> {
            self.get(key).and_then(parse_bool)
        }
    }
}
