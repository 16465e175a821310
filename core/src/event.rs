//! The canonical event vocabulary dispatched to the policy layer.

use std::ffi::OsString;

/// Kind of a canonical event, stable integer values exported to the policy
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EventKind
{
    /// Metadata of the affected entry changed.
    Attrib = 1,
    /// A file opened for writing was closed.
    Modify = 2,
    /// An entry was created.
    Create = 3,
    /// An entry was removed.
    Delete = 4,
    /// An entry was renamed; the only binary kind.
    Move = 5,
}

/// `MoveFrom`/`MoveTo` are exported to the policy layer for convenience but
/// are never the `kind` of a dispatched [`Event`]; they only ever appear as
/// raw kernel record bits before normalization pairs or flushes them.
pub const KIND_NONE: i32 = 0;
pub const KIND_MOVE_FROM: i32 = 6;
pub const KIND_MOVE_TO: i32 = 7;

/// A canonical, normalized filesystem change, as dispatched to
/// [`Policy::event`][`crate::policy::Policy::event`].
#[derive(Debug, Clone)]
pub struct Event
{
    /// What happened.
    pub kind: EventKind,
    /// Watch descriptor the event arrived on (source half's, for `Move`).
    pub watch: i32,
    /// Whether the affected entry is a directory.
    pub is_directory: bool,
    /// Basename of the affected entry (source basename, for `Move`).
    pub name: OsString,
    /// Destination basename; present only when `kind` is [`EventKind::Move`].
    pub name2: Option<OsString>,
}
