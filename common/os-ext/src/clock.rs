//! A monotonic tick source, safe against wraparound.

use std::{io, mem::MaybeUninit};

/// A point in monotonic time, as returned by [`now`].
///
/// Ticks only ever move forward relative to the process that read them, and
/// comparisons must use [`after`] rather than ordinary integer comparison so
/// that wraparound of the underlying counter is handled correctly.
pub type Ticks = i64;

/// Read the current monotonic tick count.
///
/// Backed by `clock_gettime(CLOCK_MONOTONIC)`. This must be the only time
/// source used for scheduling: unlike wall-clock time, it never jumps
/// backwards when the system clock is adjusted.
pub fn now() -> io::Result<Ticks>
{
    let mut ts = MaybeUninit::uninit();

    // SAFETY: CLOCK_MONOTONIC is always a valid clock id.
    let result = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, ts.as_mut_ptr()) };

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: clock_gettime initialized ts.
    let ts = unsafe { ts.assume_init() };

    Ok(ts.tv_sec.saturating_mul(1000).saturating_add(ts.tv_nsec / 1_000_000))
}

/// Add a duration, expressed in ticks, to a point in time.
///
/// Saturating rather than wrapping: an overflowed alarm should read as
/// "far in the future", never as "already past due".
pub fn addup(a: Ticks, b: Ticks) -> Ticks
{
    a.saturating_add(b)
}

/// Compare two tick values, safe against wraparound of the underlying
/// counter: `after(a, b)` holds iff `a` denotes a point in time strictly
/// after `b`.
pub fn after(a: Ticks, b: Ticks) -> bool
{
    b.wrapping_sub(a) < 0
}
