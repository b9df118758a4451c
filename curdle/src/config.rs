//! Cache configuration.
//!
//! Settings come from an INI file or are assembled in code via the `with_*`
//! builders; the file is optional and every field has a default. Layout:
//!
//! ```ini
//! [cache]
//! default_provider = LocalHashMapCache
//! default_ttl_ms = 300000
//! max_entries_per_store = 50000
//!
//! [store_ttl]
//! UserEntity = 600000
//! SessionToken = 30000
//! ```
//!
//! `[store_ttl]` maps store names to TTL overrides in milliseconds, applied
//! by the caching layer ahead of any profile-declared TTL.

use std::collections::HashMap;
use std::path::Path;

use ini::Ini;
use thiserror::Error;
use tracing::info;

/// Name of the provider used when none is configured or requested.
pub const DEFAULT_PROVIDER_NAME: &str = "LocalHashMapCache";

/// Registry-wide default TTL in milliseconds (5 minutes).
pub const DEFAULT_TTL_MS: i64 = 300_000;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed as INI.
    #[error("failed to load cache configuration: {0}")]
    Load(#[from] ini::Error),

    /// A field held a value that does not parse as its expected type.
    #[error("invalid value for [{section}] {key}: {value}")]
    InvalidValue {
        /// INI section name.
        section: &'static str,
        /// Key within the section.
        key: String,
        /// The offending value.
        value: String,
    },
}

/// Resolved cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Provider used when a call site names none.
    pub default_provider: String,
    /// TTL for calls with no declared TTL, in milliseconds.
    pub default_ttl_ms: i64,
    /// Per-store TTL overrides, in milliseconds.
    pub store_ttl_ms: HashMap<String, i64>,
    /// Entry bound per store; `None` means unbounded.
    pub max_entries_per_store: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_provider: DEFAULT_PROVIDER_NAME.to_string(),
            default_ttl_ms: DEFAULT_TTL_MS,
            store_ttl_ms: HashMap::new(),
            max_entries_per_store: None,
        }
    }
}

impl CacheSettings {
    /// Settings with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default provider name.
    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = name.into();
        self
    }

    /// Override the default TTL in milliseconds.
    pub fn with_default_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.default_ttl_ms = ttl_ms;
        self
    }

    /// Add a per-store TTL override.
    pub fn with_store_ttl_ms(mut self, store: impl Into<String>, ttl_ms: i64) -> Self {
        self.store_ttl_ms.insert(store.into(), ttl_ms);
        self
    }

    /// Bound each store to at most `max` entries.
    pub fn with_max_entries_per_store(mut self, max: usize) -> Self {
        self.max_entries_per_store = Some(max);
        self
    }

    /// Load settings from an INI file; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Load`] when the file cannot be read or parsed,
    /// [`ConfigError::InvalidValue`] when a numeric field does not parse.
    pub fn from_ini(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path)?;
        let mut settings = Self::default();

        if let Some(section) = ini.section(Some("cache")) {
            if let Some(value) = section.get("default_provider") {
                settings.default_provider = value.to_string();
            }
            if let Some(value) = section.get("default_ttl_ms") {
                settings.default_ttl_ms = parse_i64("cache", "default_ttl_ms", value)?;
            }
            if let Some(value) = section.get("max_entries_per_store") {
                let parsed = parse_i64("cache", "max_entries_per_store", value)?;
                if parsed < 0 {
                    return Err(ConfigError::InvalidValue {
                        section: "cache",
                        key: "max_entries_per_store".to_string(),
                        value: value.to_string(),
                    });
                }
                settings.max_entries_per_store = Some(parsed as usize);
            }
        }

        if let Some(section) = ini.section(Some("store_ttl")) {
            for (store, value) in section.iter() {
                let ttl_ms = parse_i64("store_ttl", store, value)?;
                settings.store_ttl_ms.insert(store.to_string(), ttl_ms);
            }
        }

        info!(
            path = %path.display(),
            default_provider = %settings.default_provider,
            default_ttl_ms = settings.default_ttl_ms,
            store_overrides = settings.store_ttl_ms.len(),
            "Loaded cache configuration"
        );
        Ok(settings)
    }
}

fn parse_i64(section: &'static str, key: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidValue {
            section,
            key: key.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = CacheSettings::default();
        assert_eq!(settings.default_provider, DEFAULT_PROVIDER_NAME);
        assert_eq!(settings.default_ttl_ms, DEFAULT_TTL_MS);
        assert!(settings.store_ttl_ms.is_empty());
        assert!(settings.max_entries_per_store.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            "[cache]\n\
             default_provider = MokaCache\n\
             default_ttl_ms = 60000\n\
             max_entries_per_store = 500\n\
             \n\
             [store_ttl]\n\
             Users = 600000\n\
             Sessions = 30000\n",
        );
        let settings = CacheSettings::from_ini(file.path()).unwrap();
        assert_eq!(settings.default_provider, "MokaCache");
        assert_eq!(settings.default_ttl_ms, 60_000);
        assert_eq!(settings.max_entries_per_store, Some(500));
        assert_eq!(settings.store_ttl_ms["Users"], 600_000);
        assert_eq!(settings.store_ttl_ms["Sessions"], 30_000);
    }

    #[test]
    fn test_absent_keys_keep_defaults() {
        let file = write_config("[cache]\ndefault_ttl_ms = 1000\n");
        let settings = CacheSettings::from_ini(file.path()).unwrap();
        assert_eq!(settings.default_ttl_ms, 1_000);
        assert_eq!(settings.default_provider, DEFAULT_PROVIDER_NAME);
    }

    #[test]
    fn test_invalid_ttl_is_rejected() {
        let file = write_config("[cache]\ndefault_ttl_ms = soon\n");
        let err = CacheSettings::from_ini(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_negative_capacity_is_rejected() {
        let file = write_config("[cache]\nmax_entries_per_store = -5\n");
        let err = CacheSettings::from_ini(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let err = CacheSettings::from_ini("/nonexistent/curdle.ini").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_builder_chain() {
        let settings = CacheSettings::new()
            .with_default_provider("NullCache")
            .with_default_ttl_ms(5_000)
            .with_store_ttl_ms("Users", 1_000)
            .with_max_entries_per_store(10);
        assert_eq!(settings.default_provider, "NullCache");
        assert_eq!(settings.default_ttl_ms, 5_000);
        assert_eq!(settings.store_ttl_ms["Users"], 1_000);
        assert_eq!(settings.max_entries_per_store, Some(10));
    }
}
