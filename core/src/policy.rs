//! The embedding boundary between the native core and the policy layer.
//!
//! The policy layer is normally a scripted, in-process runner; here that
//! boundary is an explicit pair of traits/structs: [`Policy`] is the
//! object-safe capability the policy implementation provides, [`CoreServices`]
//! is the capability context handed back to it, exposing exactly the
//! operations the embedding contract names.

use {
    crate::{
        event::Event,
        log::{Level, Logger, Origin},
        reaper::{wait_pids, Collector},
        watch::{real_dir, sub_dirs, Watcher},
    },
    os_ext::{exec, Ticks},
    std::{
        ffi::{CString, OsString},
        path::{Path, PathBuf},
        process::ExitCode,
        sync::atomic::{AtomicBool, AtomicI32, Ordering},
    },
};

/// How long the master loop should wait before calling [`Policy::get_alarm`]
/// again, as returned by that same method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm
{
    /// Dispatch immediately, without waiting on the event source at all.
    ImmediatelyDue,
    /// Wait on the event source with a timeout of `now` to this tick.
    Waiting(Ticks),
    /// Block on the event source indefinitely.
    Idle,
}

/// Object-safe trait implemented by the policy layer.
///
/// Every method corresponds to one of the named entry points the core
/// invokes into policy: `initialize`, `get_alarm`, `event`, `overflow`.
/// `version` is read once at startup, not per-iteration.
pub trait Policy
{
    /// Version string published by this policy implementation; checked
    /// against [`CORE_VERSION`] at startup. A mismatch is fatal.
    fn version(&self) -> &str;

    /// Called once, after watches and services are ready but before the
    /// master loop's first iteration.
    fn initialize(&mut self, services: &CoreServices);

    /// Called at the top of every master loop iteration; returns when (and
    /// whether) the loop should next wake up absent incoming events.
    fn get_alarm(&mut self, now: Ticks, services: &CoreServices) -> Alarm;

    /// Called once per normalized, dispatched event.
    fn event(&mut self, event: &Event, services: &CoreServices);

    /// Called when the kernel's event queue overflowed; no event
    /// accompanies this call; some notifications were irrecoverably lost.
    fn overflow(&mut self, services: &CoreServices);
}

/// The compiled-in core version, compared against [`Policy::version`] at
/// startup.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The process-wide reset flag: the only piece of core state a signal
/// handler may touch, and the only piece of core state that remains a true
/// global rather than living on [`CoreServices`]. A handler may do nothing
/// but `RESET_FLAG.store(true, Ordering::SeqCst)`.
pub static RESET_FLAG: AtomicBool = AtomicBool::new(false);

/// Capability context given to the policy implementation: every operation
/// callable from the policy layer.
///
/// Holds the watcher, logger, reset flag, and requested exit code; the
/// master loop owns one instance for the process lifetime and hands out
/// shared references to policy callbacks.
pub struct CoreServices
{
    watcher: Watcher,
    logger: Logger,
    exit_requested: AtomicBool,
    exit_code: AtomicI32,
}

impl CoreServices
{
    /// Build a services context around an already-created watcher and
    /// logger.
    pub fn new(watcher: Watcher, logger: Logger) -> Self
    {
        Self{
            watcher,
            logger,
            exit_requested: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
        }
    }

    /// Whether the process-wide reset flag is currently set.
    pub fn should_reset(&self) -> bool
    {
        RESET_FLAG.load(Ordering::SeqCst)
    }

    /// Borrow the watcher, for the master loop's own polling.
    pub fn watcher(&self) -> &Watcher
    {
        &self.watcher
    }

    /// Register `path` for the standard watch mask.
    pub fn add_watch(&self, path: &Path) -> Option<i32>
    {
        self.watcher.watch_add(path).ok()
    }

    /// Log a message at the given level, attributed to the policy layer.
    pub fn log(&self, level: Level, message: &str)
    {
        let _ = self.logger.log(level, Origin::Policy, message);
    }

    /// Log a message at the given level, attributed to the core itself.
    pub(crate) fn log_core(&self, level: Level, message: &str)
    {
        let _ = self.logger.log(level, Origin::Core, message);
    }

    /// Current monotonic tick count.
    pub fn now(&self) -> Ticks
    {
        os_ext::now().unwrap_or(0)
    }

    /// Add two tick values, saturating rather than wrapping.
    pub fn addup_clocks(&self, a: Ticks, b: Ticks) -> Ticks
    {
        os_ext::addup(a, b)
    }

    /// Spawn `binary` with `arguments` (argv[0] is `binary` itself);
    /// returns the child pid, or 0 on fork failure.
    pub fn exec(&self, binary: &str, arguments: &[&str]) -> libc::pid_t
    {
        let binary = match CString::new(binary) {
            Ok(b) => b,
            Err(_) => return 0,
        };
        let arguments: Vec<CString> = arguments.iter()
            .filter_map(|a| CString::new(*a).ok())
            .collect();
        let argv: Vec<&std::ffi::CStr> = std::iter::once(binary.as_c_str())
            .chain(arguments.iter().map(|a| a.as_c_str()))
            .collect();

        exec(&binary, &argv)
    }

    /// Canonicalize `path`, verify it names a directory, append a trailing
    /// separator; logs and returns [`None`] on any failure.
    pub fn real_dir(&self, path: &Path) -> Option<PathBuf>
    {
        let result = real_dir(path);
        if result.is_none() {
            self.log_core(Level::Error, &format!("real_dir: cannot resolve {}", path.display()));
        }
        result
    }

    /// Enumerate the subdirectories of `absolute_path`; honors the reset
    /// flag, returning a partial result if set mid-scan.
    pub fn sub_dirs(&self, absolute_path: &Path) -> Vec<OsString>
    {
        sub_dirs(absolute_path, &RESET_FLAG)
    }

    /// Request process termination with the given exit code; the master
    /// loop checks this after every iteration.
    pub fn terminate(&self, exit_code: i32)
    {
        self.exit_code.store(exit_code, Ordering::SeqCst);
        self.exit_requested.store(true, Ordering::SeqCst);
    }

    /// Whether [`terminate`][Self::terminate] has been called.
    pub fn exit_requested(&self) -> bool
    {
        self.exit_requested.load(Ordering::SeqCst)
    }

    /// The exit code to report, once [`exit_requested`][Self::exit_requested]
    /// is true.
    pub fn exit_code(&self) -> ExitCode
    {
        let code = self.exit_code.load(Ordering::SeqCst);
        ExitCode::from(code as u8)
    }

    /// Block until every non-zero pid in `pid_set` has been reaped or
    /// zeroed by `collector`.
    pub fn wait_pids(&self, pid_set: &mut [libc::pid_t], collector: Option<&mut Collector>)
    {
        wait_pids(pid_set, collector)
    }
}
