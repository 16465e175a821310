//! A small, hardcoded policy implementation demonstrating the embedding
//! contract: mirror one source tree onto one destination with `rsync`,
//! coalescing bursts of events behind a short settle delay.
//!
//! This stands in for the scripted policy layer, which a full deployment
//! provides itself: a real deployment supplies its own [`Policy`]
//! implementation, one per synchronization target, each paired with its own
//! runner script.

use {
    inosyncd_core::{log::Level, Alarm, CoreServices, Event, EventKind, Policy},
    std::{collections::HashSet, path::PathBuf},
};

/// How long to wait, in ticks, after the last observed change before
/// kicking off a sync. Coalesces bursts (e.g. an editor's save-as-rename
/// dance) into a single `rsync` invocation.
const SETTLE_DELAY_TICKS: i64 = 500;

/// Source tree to mirror; hardcoded for this demonstration binary.
const SOURCE: &str = "/var/lib/inosyncd/source/";

/// Destination tree `rsync` mirrors into.
const DESTINATION: &str = "/var/lib/inosyncd/mirror/";

pub struct DemoPolicy
{
    alarm_at: Option<i64>,
    running_child: [libc::pid_t; 1],
    watched: HashSet<PathBuf>,
}

impl DemoPolicy
{
    pub fn new() -> Self
    {
        Self{
            alarm_at: None,
            running_child: [0],
            watched: HashSet::new(),
        }
    }

    fn watch_tree(&mut self, services: &CoreServices, root: &PathBuf)
    {
        let Some(absolute) = services.real_dir(root) else { return };

        if self.watched.contains(&absolute) {
            return;
        }

        if services.add_watch(&absolute).is_none() {
            services.log(Level::Error, &format!("failed to watch {}", absolute.display()));
            return;
        }

        self.watched.insert(absolute.clone());

        for name in services.sub_dirs(&absolute) {
            let mut child = absolute.clone();
            child.push(name);
            self.watch_tree(services, &child);
        }
    }

    fn spawn_sync(&mut self, services: &CoreServices)
    {
        if self.running_child[0] != 0 {
            // A sync is already in flight; re-arm the alarm so the pending
            // change is retried once it completes.
            self.mark_dirty(services);
            return;
        }

        services.log(Level::Normal, "starting sync");

        let pid = services.exec(
            "/usr/bin/rsync",
            &["/usr/bin/rsync", "-a", "--delete", SOURCE, DESTINATION],
        );

        if pid == 0 {
            services.log(Level::Error, "failed to spawn rsync");
            return;
        }

        self.running_child[0] = pid;
    }

    fn reap_sync(&mut self, services: &CoreServices)
    {
        if self.running_child[0] == 0 {
            return;
        }

        services.wait_pids(&mut self.running_child, Some(&mut |pid, exit_code| {
            if exit_code != 0 {
                services.log(Level::Error, &format!("rsync (pid {pid}) exited {exit_code}"));
            } else {
                services.log(Level::Verbose, &format!("rsync (pid {pid}) completed"));
            }
            0
        }));
    }

    fn mark_dirty(&mut self, services: &CoreServices)
    {
        self.alarm_at = Some(services.addup_clocks(services.now(), SETTLE_DELAY_TICKS));
    }
}

impl Policy for DemoPolicy
{
    fn version(&self) -> &str
    {
        inosyncd_core::CORE_VERSION
    }

    fn initialize(&mut self, services: &CoreServices)
    {
        services.log(Level::Normal, &format!("watching {SOURCE}"));
        self.watch_tree(services, &PathBuf::from(SOURCE));
    }

    fn get_alarm(&mut self, now: i64, services: &CoreServices) -> Alarm
    {
        self.reap_sync(services);

        match self.alarm_at {
            Some(at) if os_ext::after(at, now) => Alarm::Waiting(at),
            Some(_) => {
                self.alarm_at = None;
                self.spawn_sync(services);
                Alarm::Idle
            },
            None => Alarm::Idle,
        }
    }

    fn event(&mut self, event: &Event, services: &CoreServices)
    {
        if event.is_directory && matches!(event.kind, EventKind::Create) {
            let mut path = PathBuf::from(SOURCE);
            path.push(&event.name);
            self.watch_tree(services, &path);
        }

        self.mark_dirty(services);
    }

    fn overflow(&mut self, services: &CoreServices)
    {
        services.log(Level::Error, "event queue overflowed; rescanning on next settle");
        self.mark_dirty(services);
    }
}
