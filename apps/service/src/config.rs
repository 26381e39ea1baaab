use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {0}: {1}")]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to write config {0}: {1}")]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to parse config {0}: {1}")]
    ParseFailed(path::PathBuf, #[source] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("no config path available (neither XDG_CONFIG_HOME nor HOME is set)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: Storage,
    pub probe: Probe,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Directory holding the host list and the check log
    pub data_dir: path::PathBuf,
    pub hosts_file: String,
    pub log_file: String,
    pub pool_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    pub timeout_seconds: u64,
    pub dns_timeout_seconds: u64,
    pub port: u16,
    pub degraded_threshold_ms: u64,
    /// Log a row without status when a host resolves but does not answer
    pub record_unreachable: bool,
    /// Honor HTTP_PROXY / NO_PROXY from the environment
    pub use_env_proxy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub interval_seconds: u64,
    pub default_host: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            hosts_file: "hosts.json".into(),
            log_file: "checks.db".into(),
            pool_size: 4,
        }
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            timeout_seconds: dyncheck::DEFAULT_TIMEOUT_SECONDS,
            dns_timeout_seconds: 5,
            port: 80,
            degraded_threshold_ms: 2000,
            record_unreachable: false,
            use_env_proxy: true,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self { interval_seconds: 60, default_host: dyncheck::DEFAULT_HOST.into() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { storage: Storage::default(), probe: Probe::default(), schedule: Schedule::default() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/dyncheck/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("dyncheck/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Storage")?;
        write_1(f, "Host List", &self.hosts_path().display())?;
        write_1(f, "Check Log", &self.log_path().display())?;
        write_1(f, "Read Pool Size", &self.storage.pool_size)?;
        write_title_1(f, "Probe")?;
        write_1(f, "Timeout (s)", &self.probe.timeout_seconds)?;
        write_1(f, "DNS Timeout (s)", &self.probe.dns_timeout_seconds)?;
        write_1(f, "Port", &self.probe.port)?;
        write_1(f, "Degraded After (ms)", &self.probe.degraded_threshold_ms)?;
        write_1(f, "Record Unreachable", &self.probe.record_unreachable)?;
        write_1(f, "Use Proxy From Env", &self.probe.use_env_proxy)?;
        write_title_1(f, "Schedule")?;
        write_1(f, "Interval (s)", &self.schedule.interval_seconds)?;
        write_1(f, "Default Host", &self.schedule.default_host)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/dyncheck/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str())
                .map_err(|err| Error::ParseFailed(config_path.clone(), err))?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            tracing::info!(path = %config_path.display(), "Wrote default config");
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        const MIN_TIMEOUT: u64 = 1;
        const MAX_TIMEOUT: u64 = 300; // 5 minutes
        const MIN_INTERVAL: u64 = 10;
        const MAX_INTERVAL: u64 = 86400; // 24 hours

        if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&self.probe.timeout_seconds) {
            return Err(Error::Invalid(format!(
                "probe.timeout_seconds must be between {} and {}, got {}",
                MIN_TIMEOUT, MAX_TIMEOUT, self.probe.timeout_seconds
            )));
        }
        if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&self.probe.dns_timeout_seconds) {
            return Err(Error::Invalid(format!(
                "probe.dns_timeout_seconds must be between {} and {}, got {}",
                MIN_TIMEOUT, MAX_TIMEOUT, self.probe.dns_timeout_seconds
            )));
        }
        if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&self.schedule.interval_seconds) {
            return Err(Error::Invalid(format!(
                "schedule.interval_seconds must be between {} and {}, got {}",
                MIN_INTERVAL, MAX_INTERVAL, self.schedule.interval_seconds
            )));
        }
        if self.probe.port == 0 {
            return Err(Error::Invalid("probe.port must not be 0".into()));
        }
        if self.storage.pool_size == 0 {
            return Err(Error::Invalid("storage.pool_size must not be 0".into()));
        }
        Ok(())
    }

    pub fn hosts_path(&self) -> path::PathBuf {
        self.storage.data_dir.join(&self.storage.hosts_file)
    }

    pub fn log_path(&self) -> path::PathBuf {
        self.storage.data_dir.join(&self.storage.log_file)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_seconds)
    }

    pub fn degraded_after(&self) -> Duration {
        Duration::from_millis(self.probe.degraded_threshold_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_seconds)
    }

    pub fn probe_settings(&self) -> dyncheck::ProbeSettings {
        dyncheck::ProbeSettings {
            port: self.probe.port,
            dns_timeout: Duration::from_secs(self.probe.dns_timeout_seconds),
            use_env_proxy: self.probe.use_env_proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config");

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("nested/config.toml").exists());

        let reread = Config::from_config(Some(&path)).unwrap();
        assert_eq!(reread, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[probe]\ntimeout_seconds = 10\nrecord_unreachable = true\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.probe.record_unreachable);
        assert_eq!(config.probe.port, 80);
        assert_eq!(config.schedule.default_host, "mijnserver.dyndns.org");
        assert_eq!(config.log_path(), path::Path::new("data/checks.db"));
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.probe.timeout_seconds = 0;
        assert!(config.validate().is_err());
        config.probe.timeout_seconds = 301;
        assert!(config.validate().is_err());
        config.probe.timeout_seconds = 5;

        config.schedule.interval_seconds = 5;
        assert!(config.validate().is_err());
        config.schedule.interval_seconds = 100_000;
        assert!(config.validate().is_err());
        config.schedule.interval_seconds = 60;

        config.probe.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_config_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[probe\n").unwrap();

        let err = Config::from_config(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::ParseFailed(ref p, _) if p == &path));
    }

    #[test]
    fn test_display_lists_sections() {
        let shown = Config::default().to_string();
        assert!(shown.contains("Storage"));
        assert!(shown.contains("Timeout (s): 5"));
        assert!(shown.contains("Default Host: mijnserver.dyndns.org"));
    }
}
