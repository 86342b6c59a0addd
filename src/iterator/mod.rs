//! Remote segment iteration
//!
//! - [`SegmentIterator`]: client-side state machine driving a server cursor
//! - [`Command`] / [`Response`]: the wire protocol
//! - [`IteratorState`]: session lifecycle

pub mod messages;
pub mod segment_iterator;
pub mod state;

pub use messages::{Command, CommandKind, Response};
pub use segment_iterator::{SegmentIterator, AUTO_SPAN};
pub use state::IteratorState;
