//! Writer wire messages

use crate::channel::ChannelKey;
use crate::segment::SegmentBounds;
use crate::telem::TimeStamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Requests sent from a writer to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WriterRequest {
    /// Open a write session on `keys`
    Open { keys: Vec<ChannelKey> },
    /// Append segments; `segments[i]` describes the i-th channel payload in `frame`
    Write {
        segments: Vec<SegmentBounds>,
        frame: Vec<u8>,
    },
    /// Make everything written since the last commit durable and visible
    Commit,
    Close,
}

/// Discriminant of a [`WriterRequest`], echoed in acknowledgements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterCommand {
    Open,
    Write,
    Commit,
    Close,
}

impl WriterRequest {
    pub fn command(&self) -> WriterCommand {
        match self {
            WriterRequest::Open { .. } => WriterCommand::Open,
            WriterRequest::Write { .. } => WriterCommand::Write,
            WriterRequest::Commit => WriterCommand::Commit,
            WriterRequest::Close => WriterCommand::Close,
        }
    }
}

impl fmt::Display for WriterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterCommand::Open => write!(f, "open"),
            WriterCommand::Write => write!(f, "write"),
            WriterCommand::Commit => write!(f, "commit"),
            WriterCommand::Close => write!(f, "close"),
        }
    }
}

/// Acknowledgement of a writer request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterResponse {
    pub command: WriterCommand,
    pub ok: bool,
    /// Commit timestamp, present on commit acknowledgements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WriterResponse {
    pub fn ok(command: WriterCommand) -> Self {
        Self {
            command,
            ok: true,
            end: None,
            error: None,
        }
    }

    pub fn committed(end: TimeStamp) -> Self {
        Self {
            command: WriterCommand::Commit,
            ok: true,
            end: Some(end),
            error: None,
        }
    }

    pub fn failed(command: WriterCommand, error: impl Into<String>) -> Self {
        Self {
            command,
            ok: false,
            end: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telem::TimeRange;
    use crate::transport::Codec;

    #[test]
    fn test_request_round_trip() {
        let requests = vec![
            WriterRequest::Open { keys: vec![1, 2] },
            WriterRequest::Write {
                segments: vec![SegmentBounds {
                    key: 1,
                    range: TimeRange::new(0, 5).unwrap(),
                }],
                frame: vec![0, 1, 2],
            },
            WriterRequest::Commit,
            WriterRequest::Close,
        ];
        for codec in [Codec::Json, Codec::Msgpack] {
            for request in &requests {
                let bytes = codec.encode(request).unwrap();
                let restored: WriterRequest = codec.decode(&bytes).unwrap();
                assert_eq!(&restored, request);
            }
        }
    }

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_string(&WriterResponse::committed(TimeStamp(9))).unwrap();
        assert_eq!(json, r#"{"command":"commit","ok":true,"end":9}"#);
    }
}
