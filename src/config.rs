//! Configuration management for treecrypt
//!
//! The only required setting is the integer shift key. It is loaded once at
//! startup and handed to every worker by argument.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of workers allowed in flight
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Environment variable overriding the key
pub const ENV_KEY: &str = "TREECRYPT_KEY";

/// Environment variable overriding the worker limit
pub const ENV_CONCURRENCY: &str = "TREECRYPT_CONCURRENCY";

/// Environment variable overriding the symlink policy
pub const ENV_FOLLOW_SYMLINKS: &str = "TREECRYPT_FOLLOW_SYMLINKS";

/// Environment variable overriding the worker program path
pub const ENV_WORKER: &str = "TREECRYPT_WORKER";

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of workers in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Follow symbolic links while enumerating
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Worker executable (defaults to `treecrypt-worker` beside the running binary)
    #[serde(default)]
    pub worker_program: Option<PathBuf>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            concurrency: DEFAULT_CONCURRENCY,
            follow_symlinks: false,
            worker_program: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shift key applied to every byte
    pub key: i64,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            key: 0,
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    /// A bare integer, optionally surrounded by whitespace
    PlainKey,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Format::Json,
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::PlainKey,
        }
    }
}

impl Config {
    /// Load configuration from a file, with environment variable overrides
    ///
    /// `.json`, `.yaml` and `.yml` files are parsed as structured config with
    /// `${VAR}` substitution. Any other file must contain a single integer,
    /// which becomes the key.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path_ref, e))
        })?;

        let mut config = Self::parse(&content, Format::of(path_ref))?;

        // Override with environment variables if set
        config.apply_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str, format: Format) -> Result<Self> {
        match format {
            Format::Json => {
                let content = Self::substitute_env_vars(content)?;
                serde_json::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))
            }
            Format::Yaml => {
                let content = Self::substitute_env_vars(content)?;
                serde_yaml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))
            }
            Format::PlainKey => Ok(Config {
                key: parse_key(content)?,
                ..Config::default()
            }),
        }
    }

    /// Substitute environment variables in config content
    /// Supports ${VAR_NAME} syntax
    fn substitute_env_vars(content: &str) -> Result<String> {
        let mut result = content.to_string();

        let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| Error::Internal(e.to_string()))?;

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];

            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(full_match, &value);
            }
        }

        Ok(result)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// A non-numeric `TREECRYPT_KEY` is an error; other malformed overrides
    /// are ignored.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(key) = std::env::var(ENV_KEY) {
            self.key = parse_key(&key)?;
        }

        if let Ok(concurrency) = std::env::var(ENV_CONCURRENCY) {
            if let Ok(n) = concurrency.trim().parse::<usize>() {
                self.scheduler.concurrency = n;
            }
        }

        if let Ok(follow) = std::env::var(ENV_FOLLOW_SYMLINKS) {
            if let Ok(follow) = follow.trim().parse::<bool>() {
                self.scheduler.follow_symlinks = follow;
            }
        }

        if let Ok(worker) = std::env::var(ENV_WORKER) {
            let worker = worker.trim();
            if !worker.is_empty() {
                self.scheduler.worker_program = Some(PathBuf::from(worker));
            }
        }

        Ok(())
    }

    /// Create a new config from environment variables only (no config file)
    pub fn from_env() -> Result<Self> {
        if std::env::var(ENV_KEY).is_err() {
            return Err(Error::Config(format!(
                "No key configured. Create a config file with 'treecrypt init --key <N>' \
                 or set {}",
                ENV_KEY
            )));
        }

        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file (format determined by extension)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        let content = match Format::of(path_ref) {
            Format::Yaml => serde_yaml::to_string(self).map_err(|e| {
                Error::Config(format!("Failed to serialize config to YAML: {}", e))
            })?,
            Format::Json => serde_json::to_string_pretty(self).map_err(|e| {
                Error::Config(format!("Failed to serialize config to JSON: {}", e))
            })?,
            Format::PlainKey => format!("{}\n", self.key),
        };

        std::fs::write(path_ref, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "scheduler.concurrency must be at least 1".to_string(),
            ));
        }

        if let Some(worker) = &self.scheduler.worker_program {
            if worker.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(
                    "scheduler.worker_program must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Parse a key, rejecting anything but a signed decimal integer
pub fn parse_key(raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("Key is missing".to_string()));
    }
    trimmed
        .parse::<i64>()
        .map_err(|e| Error::Config(format!("Key {:?} is not an integer: {}", trimmed, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("5").unwrap(), 5);
        assert_eq!(parse_key("  -300\n").unwrap(), -300);
        assert!(parse_key("").is_err());
        assert!(parse_key("five").is_err());
        assert!(parse_key("5.5").is_err());
    }

    #[test]
    fn test_json_defaults() {
        let config = Config::parse(r#"{ "key": 7 }"#, Format::Json).unwrap();
        assert_eq!(config.key, 7);
        assert_eq!(config.scheduler.concurrency, DEFAULT_CONCURRENCY);
        assert!(!config.scheduler.follow_symlinks);
        assert!(config.scheduler.worker_program.is_none());
    }

    #[test]
    fn test_json_missing_key_fails() {
        let err = Config::parse(r#"{ "scheduler": { "concurrency": 2 } }"#, Format::Json)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_json_non_numeric_key_fails() {
        assert!(Config::parse(r#"{ "key": "abc" }"#, Format::Json).is_err());
    }

    #[test]
    fn test_yaml_config() {
        let yaml = "key: -3\nscheduler:\n  concurrency: 4\n  follow_symlinks: true\n";
        let config = Config::parse(yaml, Format::Yaml).unwrap();
        assert_eq!(config.key, -3);
        assert_eq!(config.scheduler.concurrency, 4);
        assert!(config.scheduler.follow_symlinks);
    }

    #[test]
    fn test_plain_key_file() {
        let config = Config::parse("42\n", Format::PlainKey).unwrap();
        assert_eq!(config.key, 42);
        assert!(Config::parse("not a number", Format::PlainKey).is_err());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("TREECRYPT_TEST_SUBST_KEY", "19");
        let config =
            Config::parse(r#"{ "key": ${TREECRYPT_TEST_SUBST_KEY} }"#, Format::Json).unwrap();
        assert_eq!(config.key, 19);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.scheduler.concurrency = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();

        let mut config = Config::default();
        config.key = 11;
        config.scheduler.concurrency = 3;

        for name in ["config.json", "config.yaml", "key.txt"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            let content = std::fs::read_to_string(&path).unwrap();
            let loaded = Config::parse(&content, Format::of(&path)).unwrap();
            assert_eq!(loaded.key, 11);
        }
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
