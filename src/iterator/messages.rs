//! Iterator wire messages
//!
//! Commands travel client → server, responses server → client. Both are
//! closed enumerations; responses carry a `variant` discriminator.

use crate::channel::ChannelKey;
use crate::error::{Error, Result};
use crate::segment::SegmentBounds;
use crate::telem::{TimeRange, TimeSpan, TimeStamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Commands sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Open a cursor over `keys` bounded by `range`
    Open {
        keys: Vec<ChannelKey>,
        range: TimeRange,
    },
    /// Advance by `span`; a zero span moves to the next stored segment
    Next { span: TimeSpan },
    /// Retreat by `span`; a zero span moves to the previous stored segment
    Prev { span: TimeSpan },
    First,
    Last,
    NextSpan { span: TimeSpan },
    PrevSpan { span: TimeSpan },
    NextRange { range: TimeRange },
    SeekFirst,
    SeekLast,
    SeekLt { stamp: TimeStamp },
    SeekGe { stamp: TimeStamp },
    /// Ask whether the cursor currently points at data
    Valid,
    Close,
}

/// Discriminant of a [`Command`], echoed back in acknowledgements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Open,
    Next,
    Prev,
    First,
    Last,
    NextSpan,
    PrevSpan,
    NextRange,
    SeekFirst,
    SeekLast,
    SeekLt,
    SeekGe,
    Valid,
    Close,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Open { .. } => CommandKind::Open,
            Command::Next { .. } => CommandKind::Next,
            Command::Prev { .. } => CommandKind::Prev,
            Command::First => CommandKind::First,
            Command::Last => CommandKind::Last,
            Command::NextSpan { .. } => CommandKind::NextSpan,
            Command::PrevSpan { .. } => CommandKind::PrevSpan,
            Command::NextRange { .. } => CommandKind::NextRange,
            Command::SeekFirst => CommandKind::SeekFirst,
            Command::SeekLast => CommandKind::SeekLast,
            Command::SeekLt { .. } => CommandKind::SeekLt,
            Command::SeekGe { .. } => CommandKind::SeekGe,
            Command::Valid => CommandKind::Valid,
            Command::Close => CommandKind::Close,
        }
    }

    /// Reject malformed arguments before anything is sent
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::Next { span } | Command::Prev { span } if span.is_negative() => {
                Err(Error::validation(format!(
                    "{} span must be non-negative, got {}",
                    self.kind(),
                    span.0
                )))
            }
            Command::NextSpan { span } | Command::PrevSpan { span } if span.0 <= 0 => {
                Err(Error::validation(format!(
                    "{} span must be positive, got {}",
                    self.kind(),
                    span.0
                )))
            }
            Command::Open { range, .. } | Command::NextRange { range } if range.start > range.end => {
                Err(Error::validation(format!(
                    "{} range start {} is after end {}",
                    self.kind(),
                    range.start.0,
                    range.end.0
                )))
            }
            Command::Open { keys, .. } if keys.is_empty() => {
                Err(Error::validation("iterator must be opened on at least one channel"))
            }
            _ => Ok(()),
        }
    }
}

impl CommandKind {
    /// Commands that move the cursor and may be preceded by data
    pub fn is_positional(&self) -> bool {
        !matches!(
            self,
            CommandKind::Open | CommandKind::Valid | CommandKind::Close
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Open => "open",
            CommandKind::Next => "next",
            CommandKind::Prev => "prev",
            CommandKind::First => "first",
            CommandKind::Last => "last",
            CommandKind::NextSpan => "next_span",
            CommandKind::PrevSpan => "prev_span",
            CommandKind::NextRange => "next_range",
            CommandKind::SeekFirst => "seek_first",
            CommandKind::SeekLast => "seek_last",
            CommandKind::SeekLt => "seek_lt",
            CommandKind::SeekGe => "seek_ge",
            CommandKind::Valid => "valid",
            CommandKind::Close => "close",
        };
        write!(f, "{}", name)
    }
}

/// Responses sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Response {
    /// Terminates the response sequence of a command
    Ack {
        /// Whether the cursor is at a valid position after the command
        ok: bool,
        /// The command being acknowledged
        command: CommandKind,
        /// Present when the server failed to execute the command
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Segments now in view, at most one per channel
    Data {
        segments: Vec<SegmentBounds>,
        /// Binary frame, see [`crate::framer::FrameCodec`]
        frame: Vec<u8>,
    },
}

impl Response {
    pub fn ack(command: CommandKind, ok: bool) -> Self {
        Response::Ack {
            ok,
            command,
            error: None,
        }
    }

    pub fn failed(command: CommandKind, error: impl Into<String>) -> Self {
        Response::Ack {
            ok: false,
            command,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Codec;

    #[test]
    fn test_span_validation() {
        assert!(Command::Next { span: TimeSpan::ZERO }.validate().is_ok());
        assert!(Command::Next { span: TimeSpan(-1) }.validate().is_err());
        assert!(Command::Prev { span: TimeSpan(-1) }.validate().is_err());
        assert!(Command::NextSpan { span: TimeSpan::ZERO }.validate().is_err());
        assert!(Command::PrevSpan { span: TimeSpan(-5) }.validate().is_err());
        assert!(Command::PrevSpan { span: TimeSpan(5) }.validate().is_ok());
    }

    #[test]
    fn test_open_validation() {
        let inverted = TimeRange {
            start: TimeStamp(10),
            end: TimeStamp(0),
        };
        assert!(Command::Open { keys: vec![1], range: inverted }.validate().is_err());
        assert!(Command::Open { keys: vec![], range: TimeRange::MAX }.validate().is_err());
        assert!(Command::Open { keys: vec![1], range: TimeRange::MAX }.validate().is_ok());
    }

    #[test]
    fn test_positional_kinds() {
        assert!(CommandKind::Next.is_positional());
        assert!(CommandKind::SeekGe.is_positional());
        assert!(!CommandKind::Open.is_positional());
        assert!(!CommandKind::Valid.is_positional());
        assert!(!CommandKind::Close.is_positional());
    }

    #[test]
    fn test_command_json_shape() {
        let json = serde_json::to_string(&Command::SeekGe { stamp: TimeStamp(5) }).unwrap();
        assert_eq!(json, r#"{"command":"seek_ge","stamp":5}"#);
        let json = serde_json::to_string(&Command::First).unwrap();
        assert_eq!(json, r#"{"command":"first"}"#);
    }

    #[test]
    fn test_response_variants_round_trip() {
        let responses = vec![
            Response::ack(CommandKind::Next, true),
            Response::failed(CommandKind::Open, "channel 9 not found"),
            Response::Data {
                segments: vec![SegmentBounds {
                    key: 1,
                    range: TimeRange::new(0, 10).unwrap(),
                }],
                frame: vec![1, 2, 3],
            },
        ];
        for codec in [Codec::Json, Codec::Msgpack] {
            for response in &responses {
                let bytes = codec.encode(response).unwrap();
                let restored: Response = codec.decode(&bytes).unwrap();
                assert_eq!(&restored, response);
            }
        }
    }

    #[test]
    fn test_ack_omits_empty_error() {
        let json = serde_json::to_string(&Response::ack(CommandKind::Valid, false)).unwrap();
        assert_eq!(json, r#"{"variant":"ack","ok":false,"command":"valid"}"#);
    }
}
