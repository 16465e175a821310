//! Loading the small slice of configuration the core itself needs.
//!
//! The full config file belongs to the policy layer and is out of scope
//! here; the core only validates that both named files exist and extracts
//! the handful of settings below, falling back to sane defaults if the
//! file isn't recognized JSON. `serde`/`serde_json` are already part of
//! the dependency stack for this reason.

use {
    crate::{error::CoreError, log::Level},
    serde::Deserialize,
    std::path::{Path, PathBuf},
};

/// Settings the core extracts from the config file named on the command
/// line.
#[derive(Debug, Clone)]
pub struct CoreConfig
{
    /// Minimum level a message must reach to be logged.
    pub min_level: Level,
    /// Optional append-only log file path.
    pub log_file: Option<PathBuf>,
    /// Whether to also send log messages to the system log.
    pub syslog: bool,
}

impl Default for CoreConfig
{
    fn default() -> Self
    {
        Self{min_level: Level::Normal, log_file: None, syslog: false}
    }
}

#[derive(Deserialize, Default)]
struct RawConfig
{
    log_file: Option<PathBuf>,
    #[serde(default)]
    min_level: Option<RawLevel>,
    #[serde(default)]
    syslog: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawLevel { Debug, Verbose, Normal, Error }

impl From<RawLevel> for Level
{
    fn from(raw: RawLevel) -> Self
    {
        match raw {
            RawLevel::Debug   => Level::Debug,
            RawLevel::Verbose => Level::Verbose,
            RawLevel::Normal  => Level::Normal,
            RawLevel::Error   => Level::Error,
        }
    }
}

impl CoreConfig
{
    /// Validate that `config_path` and `runner_path` exist, then load the
    /// core's own settings out of `config_path`.
    ///
    /// `runner_path` is only existence-checked: its contents belong
    /// entirely to the policy layer.
    pub fn load(config_path: &Path, runner_path: Option<&Path>) -> Result<Self, CoreError>
    {
        if !config_path.exists() {
            return Err(CoreError::Startup(
                format!("config file does not exist: {}", config_path.display())
            ));
        }

        if let Some(runner_path) = runner_path {
            if !runner_path.exists() {
                return Err(CoreError::Startup(
                    format!("runner file does not exist: {}", runner_path.display())
                ));
            }
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| CoreError::Startup(format!("reading config file: {e}")))?;

        let raw: RawConfig = serde_json::from_str(&contents).unwrap_or_default();

        Ok(Self{
            min_level: raw.min_level.map(Level::from).unwrap_or(Level::Normal),
            log_file: raw.log_file,
            syslog: raw.syslog,
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf
    {
        let path = std::env::temp_dir().join(format!("inosyncd-config-test-{name}-{}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_config_file_is_a_startup_error()
    {
        let path = std::env::temp_dir().join("inosyncd-config-test-does-not-exist");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(CoreConfig::load(&path, None), Err(CoreError::Startup(_))));
    }

    #[test]
    fn missing_runner_file_is_a_startup_error()
    {
        let config = write_temp("runner-missing-config", "{}");
        let runner = std::env::temp_dir().join("inosyncd-config-test-runner-does-not-exist");
        let _ = std::fs::remove_file(&runner);
        assert!(matches!(CoreConfig::load(&config, Some(&runner)), Err(CoreError::Startup(_))));
        let _ = std::fs::remove_file(&config);
    }

    #[test]
    fn unrecognized_contents_fall_back_to_defaults()
    {
        let config = write_temp("garbage", "this is not json");
        let loaded = CoreConfig::load(&config, None).unwrap();
        assert_eq!(loaded.min_level, Level::Normal);
        assert_eq!(loaded.log_file, None);
        assert!(!loaded.syslog);
        let _ = std::fs::remove_file(&config);
    }

    #[test]
    fn recognized_keys_are_applied()
    {
        let config = write_temp("full", r#"{"log_file":"/tmp/inosyncd.log","min_level":"debug","syslog":true}"#);
        let loaded = CoreConfig::load(&config, None).unwrap();
        assert_eq!(loaded.min_level, Level::Debug);
        assert_eq!(loaded.log_file, Some(PathBuf::from("/tmp/inosyncd.log")));
        assert!(loaded.syslog);
        let _ = std::fs::remove_file(&config);
    }

    #[test]
    fn partial_contents_keep_defaults_for_missing_keys()
    {
        let config = write_temp("partial", r#"{"syslog":true}"#);
        let loaded = CoreConfig::load(&config, None).unwrap();
        assert_eq!(loaded.min_level, Level::Normal);
        assert_eq!(loaded.log_file, None);
        assert!(loaded.syslog);
        let _ = std::fs::remove_file(&config);
    }
}
