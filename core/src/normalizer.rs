//! Turning raw inotify records into the canonical event vocabulary.
//!
//! This is the hardest piece of the core: rename halves arrive as two
//! separate kernel records linked only by an opaque cookie, may straddle a
//! single read, and may never be matched at all (a rename into or out of
//! the watched region). The rules below are applied per record, in kernel
//! emission order, against a single-slot pending-move buffer.

use {
    crate::event::{Event, EventKind},
    os_ext::{inotify_read, InotifyMask, InotifyRecord},
    std::{ffi::OsString, io, os::unix::io::BorrowedFd},
};

/// Dispatch target for normalized events and the two policy-visible
/// signals that never carry a canonical event (`overflow`, debug-only
/// unrecognized records).
pub trait Sink
{
    /// A canonical event is ready for policy dispatch.
    fn event(&mut self, event: Event);

    /// The kernel's event queue overflowed; some notifications were lost.
    fn overflow(&mut self);

    /// A raw record matched none of the recognized classification bits.
    fn unrecognized(&mut self, mask: InotifyMask);
}

/// Holds the one in-flight rename half awaiting its partner, and the
/// growable scratch buffer raw records are read into.
///
/// Both fields are process-lifetime state: the pending
/// slot is created lazily and the read buffer only ever grows.
pub struct Normalizer
{
    buf: Vec<u8>,
    pending: Option<InotifyRecord>,
}

impl Default for Normalizer
{
    fn default() -> Self
    {
        Self{buf: Vec::with_capacity(2048), pending: None}
    }
}

impl Normalizer
{
    /// Construct a normalizer with the standard 2 KiB initial read buffer.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Whether a rename half is currently buffered awaiting its partner.
    pub fn has_pending(&self) -> bool
    {
        self.pending.is_some()
    }

    /// Read one batch of raw records from `fd` and classify/dispatch each
    /// to `sink` in order.
    ///
    /// Does not perform the end-of-drain flush rule; that is
    /// the master loop's responsibility once it knows no more data is
    /// immediately available.
    pub fn drain_once(&mut self, fd: BorrowedFd, sink: &mut dyn Sink) -> io::Result<()>
    {
        let records = inotify_read(fd, &mut self.buf)?;

        for record in records {
            self.classify(record, sink);
        }

        Ok(())
    }

    /// If a rename half is still buffered, flush it as `Delete`.
    ///
    /// The only mechanism by which an unmatched rename-out becomes a
    /// deletion; called by the master loop after each drain and nowhere
    /// else.
    pub fn flush_pending(&mut self, sink: &mut dyn Sink)
    {
        if let Some(pending) = self.pending.take() {
            sink.event(pending_to_delete(&pending));
        }
    }

    fn classify(&mut self, record: InotifyRecord, sink: &mut dyn Sink)
    {
        if record.mask.contains(InotifyMask::Q_OVERFLOW) {
            sink.overflow();
            return;
        }

        if record.mask.contains(InotifyMask::IGNORED) {
            return;
        }

        if record.mask.contains(InotifyMask::MOVED_FROM) {
            match self.pending.take() {
                None => self.pending = Some(record),
                Some(buffered) => {
                    sink.event(pending_to_delete(&buffered));
                    self.classify(record, sink);
                },
            }
            return;
        }

        if record.mask.contains(InotifyMask::MOVED_TO) {
            match self.pending.take() {
                Some(buffered) if buffered.cookie == record.cookie => {
                    sink.event(Event{
                        kind: EventKind::Move,
                        watch: buffered.wd,
                        is_directory: record.mask.contains(InotifyMask::ISDIR),
                        name: buffered.name,
                        name2: Some(record.name),
                    });
                },
                Some(buffered) => {
                    sink.event(pending_to_delete(&buffered));
                    sink.event(Event{
                        kind: EventKind::Create,
                        watch: record.wd,
                        is_directory: record.mask.contains(InotifyMask::ISDIR),
                        name: record.name,
                        name2: None,
                    });
                },
                None => {
                    sink.event(Event{
                        kind: EventKind::Create,
                        watch: record.wd,
                        is_directory: record.mask.contains(InotifyMask::ISDIR),
                        name: record.name,
                        name2: None,
                    });
                },
            }
            return;
        }

        let kind = if record.mask.contains(InotifyMask::ATTRIB) {
            Some(EventKind::Attrib)
        } else if record.mask.contains(InotifyMask::CLOSE_WRITE) {
            Some(EventKind::Modify)
        } else if record.mask.contains(InotifyMask::CREATE) {
            Some(EventKind::Create)
        } else if record.mask.contains(InotifyMask::DELETE)
            || record.mask.contains(InotifyMask::DELETE_SELF)
        {
            Some(EventKind::Delete)
        } else {
            None
        };

        match kind {
            Some(kind) => sink.event(Event{
                kind,
                watch: record.wd,
                is_directory: record.mask.contains(InotifyMask::ISDIR),
                name: record.name,
                name2: None,
            }),
            None => sink.unrecognized(record.mask),
        }
    }
}

fn pending_to_delete(record: &InotifyRecord) -> Event
{
    Event{
        kind: EventKind::Delete,
        watch: record.wd,
        is_directory: record.mask.contains(InotifyMask::ISDIR),
        name: record.name.clone(),
        name2: None,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[derive(Default)]
    struct Recorder
    {
        events: Vec<Event>,
        overflows: u32,
        unrecognized: u32,
    }

    impl Sink for Recorder
    {
        fn event(&mut self, event: Event) { self.events.push(event); }
        fn overflow(&mut self) { self.overflows += 1; }
        fn unrecognized(&mut self, _mask: InotifyMask) { self.unrecognized += 1; }
    }

    fn record(wd: i32, mask: InotifyMask, cookie: u32, name: &str) -> InotifyRecord
    {
        InotifyRecord{wd, mask, cookie, name: OsString::from(name)}
    }

    #[test]
    fn matched_rename_within_one_watch()
    {
        let mut n = Normalizer::new();
        let mut r = Recorder::default();

        n.classify(record(3, InotifyMask::MOVED_FROM, 42, "a"), &mut r);
        n.classify(record(3, InotifyMask::MOVED_TO, 42, "b"), &mut r);

        assert_eq!(r.events.len(), 1);
        assert_eq!(r.events[0].kind, EventKind::Move);
        assert_eq!(r.events[0].watch, 3);
        assert_eq!(r.events[0].name, "a");
        assert_eq!(r.events[0].name2.as_deref(), Some("b".as_ref()));
        assert!(!n.has_pending());
    }

    #[test]
    fn rename_out_of_watched_region_flushes_as_delete()
    {
        let mut n = Normalizer::new();
        let mut r = Recorder::default();

        n.classify(record(3, InotifyMask::MOVED_FROM, 42, "a"), &mut r);
        assert!(r.events.is_empty());
        assert!(n.has_pending());

        n.flush_pending(&mut r);
        assert_eq!(r.events.len(), 1);
        assert_eq!(r.events[0].kind, EventKind::Delete);
        assert_eq!(r.events[0].name, "a");
        assert!(!n.has_pending());
    }

    #[test]
    fn rename_into_watched_region_is_create()
    {
        let mut n = Normalizer::new();
        let mut r = Recorder::default();

        n.classify(record(3, InotifyMask::MOVED_TO, 42, "b"), &mut r);

        assert_eq!(r.events.len(), 1);
        assert_eq!(r.events[0].kind, EventKind::Create);
        assert_eq!(r.events[0].name, "b");
    }

    #[test]
    fn mismatched_cookies_produce_delete_then_create()
    {
        let mut n = Normalizer::new();
        let mut r = Recorder::default();

        n.classify(record(3, InotifyMask::MOVED_FROM, 42, "a"), &mut r);
        n.classify(record(3, InotifyMask::MOVED_TO, 99, "c"), &mut r);

        assert_eq!(r.events.len(), 2);
        assert_eq!(r.events[0].kind, EventKind::Delete);
        assert_eq!(r.events[0].name, "a");
        assert_eq!(r.events[1].kind, EventKind::Create);
        assert_eq!(r.events[1].name, "c");
        assert!(!n.has_pending());
    }

    #[test]
    fn queue_overflow_dispatches_nothing_but_the_signal()
    {
        let mut n = Normalizer::new();
        let mut r = Recorder::default();

        n.classify(record(-1, InotifyMask::Q_OVERFLOW, 0, ""), &mut r);

        assert!(r.events.is_empty());
        assert_eq!(r.overflows, 1);
    }

    #[test]
    fn second_moved_from_flushes_first_and_retains_second()
    {
        let mut n = Normalizer::new();
        let mut r = Recorder::default();

        n.classify(record(3, InotifyMask::MOVED_FROM, 1, "a"), &mut r);
        n.classify(record(3, InotifyMask::MOVED_FROM, 2, "b"), &mut r);

        assert_eq!(r.events.len(), 1);
        assert_eq!(r.events[0].kind, EventKind::Delete);
        assert_eq!(r.events[0].name, "a");
        assert!(n.has_pending());
    }

    #[test]
    fn attrib_and_create_on_same_inode_arrive_in_order()
    {
        let mut n = Normalizer::new();
        let mut r = Recorder::default();

        n.classify(record(3, InotifyMask::ATTRIB, 0, "f"), &mut r);
        n.classify(record(3, InotifyMask::CREATE, 0, "f"), &mut r);

        assert_eq!(r.events.len(), 2);
        assert_eq!(r.events[0].kind, EventKind::Attrib);
        assert_eq!(r.events[1].kind, EventKind::Create);
    }

    #[test]
    fn unrecognized_bits_are_silently_skipped()
    {
        let mut n = Normalizer::new();
        let mut r = Recorder::default();

        n.classify(record(3, InotifyMask::DONT_FOLLOW, 0, "f"), &mut r);

        assert!(r.events.is_empty());
        assert_eq!(r.unrecognized, 1);
    }

    #[test]
    fn a_real_rename_through_a_real_watcher_drains_as_one_move_event()
    {
        use crate::watch::Watcher;

        let dir = std::env::temp_dir().join(format!("inosyncd-normalizer-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a"), b"x").unwrap();

        let watcher = Watcher::new().unwrap();
        watcher.watch_add(&dir).unwrap();
        std::fs::rename(dir.join("a"), dir.join("b")).unwrap();

        let mut n = Normalizer::new();
        let mut r = Recorder::default();
        for _ in 0 .. 10 {
            n.drain_once(watcher.as_fd(), &mut r).unwrap();
            if !r.events.is_empty() {
                break;
            }
        }
        n.flush_pending(&mut r);

        assert_eq!(r.events.len(), 1);
        assert_eq!(r.events[0].kind, EventKind::Move);
        assert_eq!(r.events[0].name, "a");
        assert_eq!(r.events[0].name2.as_deref(), Some("b".as_ref()));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
