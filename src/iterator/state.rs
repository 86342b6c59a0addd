//! Iterator session states
//!
//! ```text
//! Unopened ──open──▶ Open ──ack──▶ Iterating ◀──▶ Exhausted
//!     │                │               │              │
//!     │                └──────────▶ Errored ◀─────────┘
//!     └────────────────────close─────────────────▶ Closed
//! ```

use std::fmt;

/// Lifecycle state of a [`super::SegmentIterator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorState {
    /// Created, `open` not yet acknowledged
    Unopened,
    /// `open` sent, awaiting acknowledgement
    Open,
    /// The cursor points at data
    Iterating,
    /// The cursor ran off the start or end of the range
    Exhausted,
    /// A transport or protocol failure ended the session
    Errored,
    /// Terminal
    Closed,
}

impl IteratorState {
    /// Whether positional commands may be sent
    pub fn accepts_commands(&self) -> bool {
        matches!(self, IteratorState::Iterating | IteratorState::Exhausted)
    }
}

impl fmt::Display for IteratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IteratorState::Unopened => write!(f, "unopened"),
            IteratorState::Open => write!(f, "open"),
            IteratorState::Iterating => write!(f, "iterating"),
            IteratorState::Exhausted => write!(f, "exhausted"),
            IteratorState::Errored => write!(f, "errored"),
            IteratorState::Closed => write!(f, "closed"),
        }
    }
}
