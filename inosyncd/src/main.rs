//! Daemon binary wiring the native core to a policy implementation.
//!
//! Argument parsing, daemonization, and the policy layer's own decision
//! logic are all out of scope for this binary: it does the minimum needed
//! to validate the two named files, install the reset-flag signal handler,
//! build the watcher and logger, and hand control to the master loop.

use {
    inosyncd_core::{
        master_loop, policy::RESET_FLAG, CoreConfig, CoreServices, Logger, Policy, Watcher,
    },
    std::{path::PathBuf, process::ExitCode, sync::atomic::Ordering},
};

mod demo_policy;

fn main() -> ExitCode
{
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (runner_path, config_path) = match parse_args(&args) {
        Ok(paths) => paths,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        },
    };

    install_signal_handlers();

    let config = match CoreConfig::load(&config_path, runner_path.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("startup validation failed: {error}");
            return ExitCode::FAILURE;
        },
    };

    let logger = Logger::new(config.min_level, config.log_file.clone(), config.syslog);

    let watcher = match Watcher::new().map_err(inosyncd_core::CoreError::EventSourceCreate) {
        Ok(watcher) => watcher,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        },
    };

    let services = CoreServices::new(watcher, logger);

    let mut policy = demo_policy::DemoPolicy::new();
    if policy.version() != inosyncd_core::CORE_VERSION {
        let error = inosyncd_core::CoreError::VersionMismatch{
            policy: policy.version().to_string(),
            core: inosyncd_core::CORE_VERSION,
        };
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    match master_loop::run(&mut policy, &services) {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(%error, "master loop exited abnormally");
            ExitCode::FAILURE
        },
    }
}

/// Parse `[--runner <runner-file>] <config-file>`.
fn parse_args(args: &[String]) -> Result<(Option<PathBuf>, PathBuf), String>
{
    let mut runner_path = None;
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runner" => {
                let value = args.get(i + 1)
                    .ok_or_else(|| "--runner requires an argument".to_string())?;
                runner_path = Some(PathBuf::from(value));
                i += 2;
            },
            arg => {
                positional.push(arg);
                i += 1;
            },
        }
    }

    match positional.as_slice() {
        [config] => Ok((runner_path, PathBuf::from(config))),
        [] => Err("usage: inosyncd [--runner <runner-file>] <config-file>".to_string()),
        _ => Err("too many positional arguments".to_string()),
    }
}

extern "C" fn handle_reset_signal(_signum: libc::c_int)
{
    RESET_FLAG.store(true, Ordering::SeqCst);
}

/// Install the reset-flag handler for `SIGTERM` and `SIGINT`.
///
/// The handler does nothing but the single atomic store this contract permits; all
/// other response to the signal happens at the master loop's next check
/// point.
fn install_signal_handlers()
{
    // SAFETY: handle_reset_signal is async-signal-safe.
    unsafe {
        libc::signal(libc::SIGTERM, handle_reset_signal as libc::sighandler_t);
        libc::signal(libc::SIGINT, handle_reset_signal as libc::sighandler_t);
    }
}
