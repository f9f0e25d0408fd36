//! Operation configuration and engine settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use derive_builder::Builder;
use globset::Glob;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::ConfigError;

/// Hash algorithms an operation may request by name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Blake2b,
    Blake3,
    Xxhash64,
    Crc32,
}

/// Immutable input to an operation.
///
/// Built once by the caller and validated once per execution, before the
/// operation performs any side effect.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[builder(setter(into))]
pub struct OperationConfig {
    /// Root paths the operation works on.
    #[builder(default)]
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Report intended changes without applying them.
    #[builder(default = "false")]
    #[serde(default)]
    pub dry_run: bool,

    /// Descend into subdirectories.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Follow symbolic links while walking.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Glob patterns selecting entries to include.
    #[builder(default)]
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Glob patterns (or path fragments) selecting entries to skip.
    #[builder(default)]
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Maximum walk depth (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Smallest file size of interest.
    #[builder(default)]
    #[serde(default)]
    pub min_file_size: Option<u64>,

    /// Largest file size of interest.
    #[builder(default)]
    #[serde(default)]
    pub max_file_size: Option<u64>,

    /// Name of the hash algorithm, if the operation hashes content.
    #[builder(default)]
    #[serde(default)]
    pub hash_algorithm: Option<String>,

    /// Similarity threshold in `[0.0, 1.0]`.
    #[builder(default = "0.85")]
    #[serde(default = "default_similarity")]
    pub similarity_threshold: f64,

    /// Parallelism hint (0 = auto).
    #[builder(default = "0")]
    #[serde(default)]
    pub parallelism: i32,

    /// Free-form per-operation settings.
    #[builder(default)]
    #[serde(default)]
    pub custom_settings: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn default_similarity() -> f64 {
    0.85
}

impl OperationConfigBuilder {
    /// Add a single custom setting.
    pub fn setting(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> &mut Self {
        self.custom_settings
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

impl OperationConfig {
    /// Create a new config builder.
    pub fn builder() -> OperationConfigBuilder {
        OperationConfigBuilder::default()
    }

    /// Create a simple config operating on the given paths.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Check the settings shared by every operation kind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism < 0 {
            return Err(ConfigError::NegativeParallelism {
                value: self.parallelism,
            });
        }

        if let (Some(min), Some(max)) = (self.min_file_size, self.max_file_size)
            && min > 0
            && max > 0
            && min > max
        {
            return Err(ConfigError::SizeBounds { min, max });
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::SimilarityThreshold {
                value: self.similarity_threshold,
            });
        }

        self.hash_algorithm()?;

        for pattern in self.include_patterns.iter().chain(&self.exclude_patterns) {
            Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.kind().to_string(),
            })?;
        }

        Ok(())
    }

    /// Parse the configured hash algorithm name.
    pub fn hash_algorithm(&self) -> Result<Option<HashAlgorithm>, ConfigError> {
        match self.hash_algorithm.as_deref() {
            None | Some("") => Ok(None),
            Some(name) => HashAlgorithm::from_str(name).map(Some).map_err(|_| {
                ConfigError::UnsupportedHashAlgorithm {
                    name: name.to_string(),
                }
            }),
        }
    }

    /// Effective parallelism, resolving 0 to a default of 4.
    pub fn effective_parallelism(&self) -> usize {
        match self.parallelism {
            n if n > 0 => n as usize,
            _ => 4,
        }
    }

    /// Get a custom setting.
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.custom_settings.get(key)
    }

    /// Get a custom setting as a string.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.setting(key).and_then(|v| v.as_str())
    }

    /// Get a custom setting as an unsigned integer.
    ///
    /// Numeric strings are accepted as well.
    pub fn setting_u64(&self, key: &str) -> Option<u64> {
        match self.setting(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            dry_run: false,
            recursive: true,
            follow_symlinks: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_depth: None,
            min_file_size: None,
            max_file_size: None,
            hash_algorithm: None,
            similarity_threshold: default_similarity(),
            parallelism: 0,
            custom_settings: BTreeMap::new(),
        }
    }
}

/// Engine-wide settings, usually loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum number of operations the manager runs at once.
    pub max_concurrent: usize,
    /// Buffer size of each progress subscription.
    pub subscriber_capacity: usize,
    /// Number of samples in the speed window.
    pub speed_window: usize,
    /// How long finished trackers are kept, in seconds.
    pub retention_secs: u64,
    /// Interval of periodic progress re-broadcasts, in milliseconds.
    pub report_interval_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            subscriber_capacity: 10,
            speed_window: 10,
            retention_secs: 3600,
            report_interval_ms: 500,
        }
    }
}

impl EngineSettings {
    /// Parse settings from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut settings: Self =
            toml::from_str(text).map_err(|source| ConfigError::Parse { source })?;
        settings.normalize();
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Retention window for finished trackers.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Interval of periodic progress re-broadcasts.
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    // Zero values would disable the manager or the fan-out entirely.
    fn normalize(&mut self) {
        let defaults = Self::default();
        if self.max_concurrent == 0 {
            self.max_concurrent = defaults.max_concurrent;
        }
        if self.subscriber_capacity == 0 {
            self.subscriber_capacity = defaults.subscriber_capacity;
        }
        if self.speed_window < 2 {
            self.speed_window = defaults.speed_window;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OperationConfig::builder()
            .paths(vec![PathBuf::from("/data")])
            .dry_run(true)
            .exclude_patterns(vec!["*.tmp".to_string()])
            .setting("target_user", "1000")
            .build()
            .unwrap();

        assert_eq!(config.paths, vec![PathBuf::from("/data")]);
        assert!(config.dry_run);
        assert!(config.recursive);
        assert_eq!(config.setting_str("target_user"), Some("1000"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = OperationConfig {
            parallelism: -1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeParallelism { value: -1 })
        ));

        let config = OperationConfig {
            min_file_size: Some(100),
            max_file_size: Some(10),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::SizeBounds { .. })));

        let config = OperationConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SimilarityThreshold { .. })
        ));

        let config = OperationConfig {
            hash_algorithm: Some("whirlpool".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedHashAlgorithm { .. })
        ));

        let config = OperationConfig {
            exclude_patterns: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_size_bounds_ignore_zero() {
        let config = OperationConfig {
            min_file_size: Some(100),
            max_file_size: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hash_algorithm_names() {
        let config = OperationConfig {
            hash_algorithm: Some("blake2b".to_string()),
            ..Default::default()
        };
        assert_eq!(config.hash_algorithm().unwrap(), Some(HashAlgorithm::Blake2b));
        assert_eq!(HashAlgorithm::Xxhash64.to_string(), "xxhash64");
    }

    #[test]
    fn test_setting_u64_accepts_strings() {
        let config = OperationConfig::builder()
            .setting("uid", 1000)
            .setting("gid", "100")
            .build()
            .unwrap();
        assert_eq!(config.setting_u64("uid"), Some(1000));
        assert_eq!(config.setting_u64("gid"), Some(100));
        assert_eq!(config.setting_u64("missing"), None);
    }

    #[test]
    fn test_engine_settings_from_toml() {
        let settings = EngineSettings::from_toml_str("max_concurrent = 2\nretention_secs = 60\n").unwrap();
        assert_eq!(settings.max_concurrent, 2);
        assert_eq!(settings.retention(), Duration::from_secs(60));
        assert_eq!(settings.subscriber_capacity, 10);

        let settings = EngineSettings::from_toml_str("max_concurrent = 0").unwrap();
        assert_eq!(settings.max_concurrent, 4);

        assert!(EngineSettings::from_toml_str("max_concurrent = \"many\"").is_err());
    }
}
