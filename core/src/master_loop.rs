//! The single-threaded cooperative multiplexer driving the whole core.
//!
//! Each iteration interleaves the event source, the policy-driven alarm,
//! and (indirectly, via policy dispatch) child reaping, without ever
//! spawning a second thread: the only preemption anywhere in the process is
//! signal delivery, and a signal handler may do nothing but store to the
//! reset flag.

use {
    crate::{
        error::CoreError,
        log::Level,
        normalizer::{Normalizer, Sink},
        policy::{Alarm, CoreServices, Policy},
    },
    os_ext::{poll_readable, PollResult},
    std::process::ExitCode,
};

struct PolicySink<'a, P: Policy + ?Sized>
{
    policy: &'a mut P,
    services: &'a CoreServices,
}

impl<'a, P: Policy + ?Sized> Sink for PolicySink<'a, P>
{
    fn event(&mut self, event: crate::event::Event)
    {
        self.policy.event(&event, self.services);
    }

    fn overflow(&mut self)
    {
        self.policy.overflow(self.services);
    }

    fn unrecognized(&mut self, mask: os_ext::InotifyMask)
    {
        self.services.log_core(Level::Debug, &format!("unrecognized event bits: {mask:?}"));
    }
}

/// Run the master loop to completion.
///
/// Calls [`Policy::initialize`] once, then iterates step 1-6 of the
/// embedding contract until the reset flag is set or the policy calls
/// `terminate`. Returns the exit code requested by `terminate`, or
/// [`ExitCode::SUCCESS`] if the loop only ever exited via the reset flag.
pub fn run(policy: &mut dyn Policy, services: &CoreServices) -> Result<ExitCode, CoreError>
{
    let mut normalizer = Normalizer::new();

    policy.initialize(services);

    while !services.should_reset() && !services.exit_requested() {
        let now = services.now();

        match policy.get_alarm(now, services) {
            Alarm::ImmediatelyDue => {
                // Fall through without reading events: whatever work was
                // due already ran inside the `get_alarm` call itself. Loop
                // straight back to step 1 rather than waiting.
            },
            Alarm::Waiting(alarm) => {
                if !os_ext::after(alarm, now) {
                    services.log_core(
                        Level::Error,
                        &format!("policy alarm {alarm} is not strictly after now {now}"),
                    );
                    return Err(CoreError::PastDueAlarm{now, alarm});
                }

                let timeout_ms = (alarm - now).clamp(0, i32::MAX as i64) as i32;
                let fd = services.watcher().as_fd();
                if poll_readable(fd, Some(timeout_ms)).map_err(|e| CoreError::Unexpected(e.into()))?
                    == PollResult::Readable
                {
                    drain(services, &mut normalizer, policy);
                }
            },
            Alarm::Idle => {
                let fd = services.watcher().as_fd();
                if poll_readable(fd, None).map_err(|e| CoreError::Unexpected(e.into()))?
                    == PollResult::Readable
                {
                    drain(services, &mut normalizer, policy);
                }
            },
        }
    }

    Ok(services.exit_code())
}

/// Drain the event source until no more data is immediately available,
/// dispatching each classified record, then apply the flush rule.
///
/// Bound only by the reset flag: a pathological producer
/// cannot be starved out by this loop, but a reset request still cuts it
/// short promptly.
fn drain(services: &CoreServices, normalizer: &mut Normalizer, policy: &mut dyn Policy)
{
    let mut sink = PolicySink{policy, services};

    loop {
        if services.should_reset() {
            break;
        }

        if normalizer.drain_once(services.watcher().as_fd(), &mut sink).is_err() {
            break;
        }

        match poll_readable(services.watcher().as_fd(), Some(0)) {
            Ok(PollResult::Readable) => continue,
            _ => break,
        }
    }

    normalizer.flush_pending(&mut sink);
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{event::Event, log::Logger};

    struct TerminatesImmediately;

    impl Policy for TerminatesImmediately
    {
        fn version(&self) -> &str { crate::policy::CORE_VERSION }
        fn initialize(&mut self, _services: &CoreServices) {}
        fn get_alarm(&mut self, _now: i64, services: &CoreServices) -> Alarm
        {
            services.terminate(7);
            Alarm::Idle
        }
        fn event(&mut self, _event: &Event, _services: &CoreServices) {}
        fn overflow(&mut self, _services: &CoreServices) {}
    }

    #[test]
    fn terminate_called_from_get_alarm_stops_the_loop_with_its_exit_code()
    {
        let watcher = crate::watch::Watcher::new().unwrap();
        let services = CoreServices::new(watcher, Logger::new(Level::Normal, None, false));
        let mut policy = TerminatesImmediately;

        let code = run(&mut policy, &services).unwrap();
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::from(7)));
    }
}
