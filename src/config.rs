//! Configuration loading and constants.
//!
//! Loads application configuration from an optional TOML file. Every section
//! has defaults, so running without a file reproduces the stock test setup:
//! `/init.sh` resets `/dav/<container>`, and resetting `nextcloud` waits for
//! `nextcloud:1337` to accept connections. `AppConfig` is the root
//! configuration struct containing all settings.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::container::ContainerName;

// =============================================================================
// HTTP Listener
// =============================================================================

/// Default bind address
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Seconds to wait for in-flight requests on shutdown
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

// =============================================================================
// Reset Defaults
// =============================================================================

/// Script run to reset a container's data directory
pub const DEFAULT_INIT_SCRIPT: &str = "/init.sh";

/// Directory holding one data directory per container
pub const DEFAULT_DATA_ROOT: &str = "/dav";

/// Container whose reset waits for a dependent service
pub const DEFAULT_PROBE_CONTAINER: &str = "nextcloud";

/// Host probed after resetting the default probe container
pub const DEFAULT_PROBE_HOST: &str = "nextcloud";

/// Port probed after resetting the default probe container
pub const DEFAULT_PROBE_PORT: u16 = 1337;

/// How long a probe keeps retrying before giving up
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 60;

/// Pause between failed connection attempts
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 500;

/// How long to keep reading init script output after the script has exited
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Configuration file read when `--config` is not given (optional)
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dav-controller.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "dav_controller=debug,tower_http=debug";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Init script and probe settings
    #[serde(default)]
    pub reset: ResetConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HTTP_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_HTTP_PORT
    }
}

/// How containers are reset
#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    /// Executable invoked with the container's data directory as its only argument
    #[serde(default = "ResetConfig::default_init_script")]
    pub init_script: PathBuf,
    /// Parent directory of all container data directories
    #[serde(default = "ResetConfig::default_data_root")]
    pub data_root: PathBuf,
    /// Reachability probes run after a successful reset, keyed by container
    #[serde(default = "ResetConfig::default_probes", rename = "probe")]
    pub probes: Vec<ProbeConfig>,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            init_script: Self::default_init_script(),
            data_root: Self::default_data_root(),
            probes: Self::default_probes(),
        }
    }
}

impl ResetConfig {
    fn default_init_script() -> PathBuf {
        PathBuf::from(DEFAULT_INIT_SCRIPT)
    }

    fn default_data_root() -> PathBuf {
        PathBuf::from(DEFAULT_DATA_ROOT)
    }

    fn default_probes() -> Vec<ProbeConfig> {
        vec![ProbeConfig {
            container: DEFAULT_PROBE_CONTAINER.to_string(),
            host: DEFAULT_PROBE_HOST.to_string(),
            port: DEFAULT_PROBE_PORT,
            timeout_seconds: DEFAULT_PROBE_TIMEOUT_SECS,
            interval_ms: DEFAULT_PROBE_INTERVAL_MS,
        }]
    }
}

/// A TCP port that must accept connections after a container is reset
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Container name that triggers this probe
    pub container: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "ProbeConfig::default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "ProbeConfig::default_interval")]
    pub interval_ms: u64,
}

impl ProbeConfig {
    fn default_timeout() -> u64 {
        DEFAULT_PROBE_TIMEOUT_SECS
    }

    fn default_interval() -> u64 {
        DEFAULT_PROBE_INTERVAL_MS
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load the file at `path` if given, otherwise the default path if it exists,
    /// otherwise built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reset.init_script.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "reset.init_script must not be empty".to_string(),
            ));
        }
        if self.reset.data_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "reset.data_root must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for probe in &self.reset.probes {
            if let Err(e) = ContainerName::parse(&probe.container) {
                return Err(ConfigError::Validation(format!("reset.probe: {}", e)));
            }
            if !seen.insert(probe.container.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "reset.probe: container '{}' configured more than once",
                    probe.container
                )));
            }
            if probe.port == 0 {
                return Err(ConfigError::Validation(format!(
                    "reset.probe: port for '{}' must be non-zero",
                    probe.container
                )));
            }
            if probe.interval_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "reset.probe: interval_ms for '{}' must be non-zero",
                    probe.container
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_stock_setup() {
        let config = AppConfig::default();
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 5000);
        assert_eq!(config.reset.init_script, PathBuf::from("/init.sh"));
        assert_eq!(config.reset.data_root, PathBuf::from("/dav"));
        assert_eq!(config.reset.probes.len(), 1);

        let probe = &config.reset.probes[0];
        assert_eq!(probe.container, "nextcloud");
        assert_eq!(probe.host, "nextcloud");
        assert_eq!(probe.port, 1337);
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_packaged_config_matches_defaults() {
        let config = AppConfig::from_toml(include_str!("../dist/dav-controller.toml")).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.http.port, defaults.http.port);
        assert_eq!(config.reset.init_script, defaults.reset.init_script);
        assert_eq!(config.reset.data_root, defaults.reset.data_root);
        assert_eq!(config.reset.probes.len(), 1);
        assert_eq!(config.reset.probes[0].port, DEFAULT_PROBE_PORT);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.reset.init_script, PathBuf::from(DEFAULT_INIT_SCRIPT));
        assert_eq!(config.reset.probes[0].port, DEFAULT_PROBE_PORT);
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml(
            r#"
            [http]
            host = "127.0.0.1"
            port = 8080

            [reset]
            init_script = "/opt/reset.sh"
            data_root = "/srv/dav"

            [[reset.probe]]
            container = "owncloud"
            host = "owncloud"
            port = 8443
            timeout_seconds = 5
            interval_ms = 100

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.reset.data_root, PathBuf::from("/srv/dav"));
        assert_eq!(config.reset.probes.len(), 1);
        assert_eq!(config.reset.probes[0].container, "owncloud");
        assert_eq!(config.reset.probes[0].timeout(), Duration::from_secs(5));
        assert_eq!(config.reset.probes[0].interval(), Duration::from_millis(100));
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_probes_can_be_disabled() {
        let config = AppConfig::from_toml("[reset]\nprobe = []\n").unwrap();
        assert!(config.reset.probes.is_empty());
    }

    #[test]
    fn test_rejects_invalid_probe_container() {
        let err = AppConfig::from_toml(
            r#"
            [[reset.probe]]
            container = "../etc"
            host = "x"
            port = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_duplicate_probe() {
        let err = AppConfig::from_toml(
            r#"
            [[reset.probe]]
            container = "nextcloud"
            host = "a"
            port = 1

            [[reset.probe]]
            container = "nextcloud"
            host = "b"
            port = 2
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_zero_port() {
        let err = AppConfig::from_toml(
            r#"
            [[reset.probe]]
            container = "nextcloud"
            host = "nextcloud"
            port = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_empty_init_script() {
        let err = AppConfig::from_toml("[reset]\ninit_script = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = AppConfig::from_toml("[http\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nport = 9000").unwrap();

        let config = AppConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, DEFAULT_HTTP_HOST);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = AppConfig::load_or_default(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
