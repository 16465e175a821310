//! Native core of a live file-tree mirroring daemon.
//!
//! This crate provides the kernel-proximal services a higher-level policy
//! layer cannot implement itself: an inotify-backed event source, the
//! normalization of raw kernel records (including rename-half pairing)
//! into a canonical event vocabulary, a single-threaded cooperative master
//! loop multiplexing that source with a policy-driven timer and child
//! reaping, and a handful of OS helpers and structured logging exposed to
//! the policy layer through the [`policy`] module's embedding boundary.
//!
//! What this crate does not do: cross-platform filesystem watching (it is
//! Linux/inotify-only, transitively through [`os_ext`]), transfer of file
//! contents (left to spawned helper binaries), or persistence of state
//! across restarts.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod master_loop;
pub mod normalizer;
pub mod policy;
pub mod reaper;
pub mod watch;

pub use crate::{
    config::CoreConfig,
    error::CoreError,
    event::{Event, EventKind, KIND_MOVE_FROM, KIND_MOVE_TO, KIND_NONE},
    log::{Level, Logger, Origin, CORE_ORIGIN},
    policy::{Alarm, CoreServices, Policy, CORE_VERSION, RESET_FLAG},
    reaper::{wait_pids, Collector},
    watch::{real_dir, sub_dirs, Watcher},
};
