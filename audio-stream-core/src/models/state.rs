use std::fmt;

use serde::Serialize;

/// Native continuation code: keep invoking the callback.
pub const CONTINUE: i32 = 0;
/// Native continuation code: drain pending buffers, then stop.
pub const COMPLETE: i32 = 1;
/// Native continuation code: stop as soon as possible, discarding buffers.
pub const ABORT: i32 = 2;

/// Opaque identifier assigned to a stream by the native layer at open time.
///
/// The raw integer may be reused by the native engine after close; the
/// managed [`Stream`](crate::session::stream::Stream) it named is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StreamId(i32);

impl StreamId {
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream #{}", self.0)
    }
}

/// Lifecycle state of an open stream.
///
/// State transitions:
/// ```text
/// opened → started ⇄ stopped → closed
///             ↓         ↓
///             └→ aborted ←┘ → closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Opened,
    Started,
    Stopped,
    Aborted,
    Closed,
}

impl StreamState {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn can_start(&self) -> bool {
        matches!(self, Self::Opened | Self::Stopped)
    }

    pub fn can_abort(&self) -> bool {
        matches!(self, Self::Started | Self::Stopped)
    }

    pub fn can_close(&self) -> bool {
        matches!(self, Self::Opened | Self::Stopped | Self::Aborted)
    }
}

/// Value returned by a stream callback after each period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackState {
    /// Keep processing.
    Running,
    /// All data has been produced/consumed; no further callbacks are needed.
    Complete,
    /// Stop as soon as possible, possibly abandoning buffered data.
    Aborted,
}

impl CallbackState {
    /// The continuation code handed back to the native engine.
    pub const fn continuation_code(self) -> i32 {
        match self {
            Self::Running => CONTINUE,
            Self::Complete => COMPLETE,
            Self::Aborted => ABORT,
        }
    }

    pub const fn from_continuation_code(code: i32) -> Option<Self> {
        match code {
            CONTINUE => Some(Self::Running),
            COMPLETE => Some(Self::Complete),
            ABORT => Some(Self::Aborted),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}
