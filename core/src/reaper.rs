//! Reaping children spawned via [`crate::policy::CoreServices::exec`].

use os_ext::{waitpid_any_block, waitpid_any_nohang, WaitResult};

/// A type-erased callback invoked once per reaped child that belongs to the
/// caller's pid set.
///
/// Given `(pid, exit_code)`, it returns the pid that should replace every
/// slot currently holding `pid`: zero to simply clear those slots, or a new
/// pid if the caller wants to track a just-spawned replacement process.
pub type Collector<'a> = dyn FnMut(libc::pid_t, i32) -> libc::pid_t + 'a;

/// Reap children until every non-zero entry of `pid_set` has been accounted
/// for.
///
/// `pid_set` is scanned in place: slots already zero don't count towards
/// `remaining`, and whenever a tracked pid is reaped every slot holding it
/// is overwritten with the collector's return value (or cleared to zero, if
/// no collector was supplied). `remaining` only drops for slots that land on
/// zero: a collector that installs a replacement pid keeps `remaining`
/// unchanged for that slot, since there is still a live pid there to reap
/// later. Children that are not in `pid_set` are reaped and silently
/// discarded; this includes stray grandchildren as much as processes that
/// exited before this call began. A child that did not exit normally (was
/// killed by a signal, say) is reaped and then ignored entirely, even if it
/// was in `pid_set`: `remaining` is not decremented for it, leaving such an
/// entry in limbo rather than trying to guess a replacement.
///
/// Blocks if no child has already terminated, since this is only ever
/// called once the master loop's alarm or event source has nothing left to
/// offer.
pub fn wait_pids(pid_set: &mut [libc::pid_t], mut collector: Option<&mut Collector>)
{
    let mut remaining = pid_set.iter().filter(|&&pid| pid != 0).count();

    while remaining > 0 {
        let result = match waitpid_any_nohang() {
            Ok(WaitResult::Exited(pid, status)) => WaitResult::Exited(pid, status),
            Ok(WaitResult::NoHang) => match waitpid_any_block() {
                Ok(result) => result,
                Err(_) => return,
            },
            Err(_) => return,
        };

        let (pid, status) = match result {
            WaitResult::Exited(pid, status) => (pid, status),
            WaitResult::NoHang => continue,
        };

        let exit_code = match status.code() {
            Some(code) => code,
            None => continue,
        };

        if !pid_set.iter().any(|&tracked| tracked == pid) {
            continue;
        }

        let replacement = match &mut collector {
            Some(collector) => collector(pid, exit_code),
            None => 0,
        };

        for slot in pid_set.iter_mut() {
            if *slot == pid {
                *slot = replacement;
                if replacement == 0 {
                    remaining -= 1;
                }
            }
        }
    }
}
