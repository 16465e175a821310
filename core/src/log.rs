//! Level-filtered structured logging to console, file, and syslog.
//!
//! This is the policy-facing logger named by the embedding contract,
//! distinct from the `tracing` diagnostics the daemon binary installs for
//! its own internal lifecycle events. Policy code only ever sees this type.

use {
    crate::error::CoreError,
    os_ext::{cstr, openat, O_APPEND, O_CREAT, O_WRONLY},
    std::{
        ffi::CString,
        io::Write,
        os::unix::ffi::OsStrExt,
        path::PathBuf,
    },
};

/// Minimum severity a message must reach to be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum Level
{
    /// Verbose internal detail, useful only when diagnosing the core itself.
    Debug = 1,
    /// Ordinary operational detail.
    Verbose = 2,
    /// The default level: user-relevant events.
    Normal = 3,
    /// Failures.
    Error = 4,
}

/// Bit marking a level as having originated inside the native core, as
/// opposed to having been forwarded from the policy layer.
pub const CORE_ORIGIN: i32 = 0x80;

/// Whether a logged message originated in the core or was forwarded from
/// policy; becomes a textual prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin
{
    /// Emitted by the native core itself.
    Core,
    /// Forwarded on the policy layer's behalf.
    Policy,
}

impl Origin
{
    fn prefix(self) -> &'static str
    {
        match self {
            Origin::Core   => "Core",
            Origin::Policy => "Policy",
        }
    }
}

/// Process-wide log configuration and state, owned by [`CoreServices`][cs].
///
/// [cs]: crate::policy::CoreServices
pub struct Logger
{
    min_level: Level,
    log_file: Option<PathBuf>,
    syslog_enabled: bool,
    daemonized: bool,
}

impl Logger
{
    /// Create a logger from the settings resolved at startup.
    pub fn new(min_level: Level, log_file: Option<PathBuf>, syslog_enabled: bool) -> Self
    {
        if syslog_enabled {
            os_ext::openlog(cstr!("inosyncd"));
        }

        Self{min_level, log_file, syslog_enabled, daemonized: false}
    }

    /// Mark the process as daemonized: suppresses the stdout/stderr sink.
    pub fn set_daemonized(&mut self, daemonized: bool)
    {
        self.daemonized = daemonized;
    }

    /// Log a pre-formatted message at the given level and origin.
    ///
    /// Messages below the configured minimum level are dropped before
    /// reaching any sink. Failure to open the configured log file is fatal;
    /// every other sink failure is swallowed.
    pub fn log(&self, level: Level, origin: Origin, message: &str) -> Result<(), CoreError>
    {
        if level < self.min_level {
            return Ok(());
        }

        let line = format!("{}: {}", origin.prefix(), message);

        if !self.daemonized {
            self.log_console(level, &line);
        }

        if let Some(path) = &self.log_file {
            self.log_file(path, &line)?;
        }

        if self.syslog_enabled {
            self.log_syslog(level, &line);
        }

        Ok(())
    }

    fn log_console(&self, level: Level, line: &str)
    {
        let now = std::time::SystemTime::now();
        let timestamp = format_hh_mm_ss(now);
        let prefixed = format!("{timestamp}: {line}\n");

        // Sink failure here must never take the process down with it: if
        // stderr itself is gone there is nowhere left to report that.
        let _ = if level == Level::Error {
            std::io::stderr().write_all(prefixed.as_bytes())
        } else {
            std::io::stdout().write_all(prefixed.as_bytes())
        };
    }

    fn log_file(&self, path: &PathBuf, line: &str) -> Result<(), CoreError>
    {
        let path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| CoreError::Unexpected(e.into()))?;

        let fd = openat(None, &path, O_WRONLY | O_CREAT | O_APPEND, 0o644)
            .map_err(CoreError::LogFileOpen)?;

        let mut file = std::fs::File::from(fd);
        // A write failure here means the log file is unusable, which is as
        // fatal as failing to open it in the first place.
        file.write_all(line.as_bytes()).and_then(|()| file.write_all(b"\n"))
            .map_err(CoreError::LogFileOpen)?;
        let _ = file.sync_data();

        Ok(())
    }

    fn log_syslog(&self, level: Level, line: &str)
    {
        let priority = match level {
            Level::Debug            => libc::LOG_DEBUG,
            Level::Verbose | Level::Normal => libc::LOG_NOTICE,
            Level::Error             => libc::LOG_ERR,
        };

        if let Ok(line) = CString::new(line) {
            os_ext::syslog(priority, &line);
        }
    }
}

impl Drop for Logger
{
    fn drop(&mut self)
    {
        if self.syslog_enabled {
            os_ext::closelog();
        }
    }
}

/// Self-written `HH:MM:SS` formatter; the one spot in the core that touches
/// wall-clock time, purely for log readability, never for scheduling.
fn format_hh_mm_ss(time: std::time::SystemTime) -> String
{
    let secs = time.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let (h, m, s) = ((secs / 3600) % 24, (secs / 60) % 60, secs % 60);
    format!("{h:02}:{m:02}:{s:02}")
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn temp_path(name: &str) -> PathBuf
    {
        std::env::temp_dir().join(format!("inosyncd-log-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn messages_below_the_minimum_level_are_dropped()
    {
        let path = temp_path("below-min");
        let _ = std::fs::remove_file(&path);
        let logger = Logger::new(Level::Error, Some(path.clone()), false);
        logger.log(Level::Normal, Origin::Policy, "should not appear").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn messages_at_or_above_the_minimum_level_reach_the_log_file()
    {
        let path = temp_path("reaches-file");
        let _ = std::fs::remove_file(&path);
        let logger = Logger::new(Level::Normal, Some(path.clone()), false);
        logger.log(Level::Error, Origin::Core, "disk full").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Core: disk full"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn log_file_messages_append_rather_than_truncate()
    {
        let path = temp_path("appends");
        let _ = std::fs::remove_file(&path);
        let logger = Logger::new(Level::Normal, Some(path.clone()), false);
        logger.log(Level::Normal, Origin::Policy, "first").unwrap();
        logger.log(Level::Normal, Origin::Policy, "second").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("first"));
        assert!(contents.contains("second"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unwritable_log_file_path_is_a_log_file_open_error()
    {
        let logger = Logger::new(Level::Normal, Some(PathBuf::from("/nonexistent-dir/inosyncd.log")), false);
        assert!(matches!(
            logger.log(Level::Error, Origin::Core, "anything"),
            Err(CoreError::LogFileOpen(_)),
        ));
    }

    #[test]
    fn origin_prefixes_distinguish_core_from_policy()
    {
        assert_eq!(Origin::Core.prefix(), "Core");
        assert_eq!(Origin::Policy.prefix(), "Policy");
    }
}
