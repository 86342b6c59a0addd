//! Binary frame codec
//!
//! Layout (all integers little-endian):
//! ```text
//! ┌────────────────────────────────────────┐
//! │ count: u32                             │
//! ├────────────────────────────────────────┤
//! │ PAYLOADS (count times)                 │
//! │   length: u32  (bytes after this field)│
//! │   key: u32                             │
//! │   samples: u32                         │
//! │   data: [u8; length - 8]               │
//! └────────────────────────────────────────┘
//! ```
//!
//! No per-element type tags are written. The decoder learns each channel's
//! element width from the key and data type vectors negotiated when the
//! session was opened.

use super::frame::Frame;
use crate::channel::ChannelKey;
use crate::error::{Error, Result};
use crate::telem::{DataType, Series};
use std::collections::HashMap;

/// Bytes taken by the frame's payload count
pub const FRAME_HEADER_SIZE: usize = 4;

/// Bytes taken by each payload's length, key and sample count
pub const PAYLOAD_HEADER_SIZE: usize = 12;

/// Encodes and decodes frames for one session's channel set
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    keys: Vec<ChannelKey>,
    data_types: Vec<DataType>,
}

impl FrameCodec {
    /// Codec bound to index-aligned key and data type vectors
    pub fn new(keys: Vec<ChannelKey>, data_types: Vec<DataType>) -> Self {
        Self { keys, data_types }
    }

    pub fn keys(&self) -> &[ChannelKey] {
        &self.keys
    }

    pub fn data_types(&self) -> &[DataType] {
        &self.data_types
    }

    /// Decode with this codec's negotiated channel set
    pub fn decode_frame(&self, bytes: &[u8]) -> Result<Frame> {
        Self::decode(bytes, &self.keys, &self.data_types)
    }

    /// Exact size of `frame` once encoded
    pub fn encoded_len(frame: &Frame) -> usize {
        FRAME_HEADER_SIZE
            + frame
                .iter()
                .map(|(_, s)| PAYLOAD_HEADER_SIZE + s.byte_len())
                .sum::<usize>()
    }

    /// Encode a frame to its wire form
    pub fn encode(frame: &Frame) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::encoded_len(frame));
        buf.extend_from_slice(&to_u32(frame.len(), "channel count")?.to_le_bytes());

        for (key, series) in frame.iter() {
            let length = to_u32(8 + series.byte_len(), "payload length")?;
            let samples = to_u32(series.len(), "sample count")?;
            buf.extend_from_slice(&length.to_le_bytes());
            buf.extend_from_slice(&key.to_le_bytes());
            buf.extend_from_slice(&samples.to_le_bytes());
            buf.extend_from_slice(series.data());
        }
        Ok(buf)
    }

    /// Decode a frame, resolving element widths through `keys`/`data_types`
    ///
    /// Any inconsistency is fatal; nothing is partially decoded.
    pub fn decode(bytes: &[u8], keys: &[ChannelKey], data_types: &[DataType]) -> Result<Frame> {
        let positions: HashMap<ChannelKey, usize> =
            keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        let mut reader = Reader::new(bytes);
        let count = reader.u32()? as usize;
        let mut frame = Frame::new();

        for _ in 0..count {
            let length = reader.u32()? as usize;
            if length < 8 {
                return Err(Error::validation(format!(
                    "payload length {} is shorter than its header",
                    length
                )));
            }
            let key = reader.u32()?;
            let samples = reader.u32()? as usize;
            let data = reader.take(length - 8)?;

            let position = positions.get(&key).ok_or_else(|| {
                Error::validation(format!("unknown channel key {} in frame", key))
            })?;
            let data_type = data_types.get(*position).ok_or_else(|| {
                Error::validation(format!("no data type declared for channel key {}", key))
            })?;

            let width = data_type.density();
            if data.len() % width != 0 {
                return Err(Error::validation(format!(
                    "channel {}: {} bytes is not a multiple of the {} width {}",
                    key,
                    data.len(),
                    data_type,
                    width
                )));
            }
            if data.len() / width != samples {
                return Err(Error::validation(format!(
                    "channel {}: header declares {} samples but payload holds {}",
                    key,
                    samples,
                    data.len() / width
                )));
            }

            frame.push(key, Series::from_bytes(*data_type, data.to_vec())?)?;
        }

        if reader.remaining() != 0 {
            return Err(Error::validation(format!(
                "{} trailing bytes after frame",
                reader.remaining()
            )));
        }
        Ok(frame)
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::validation(format!("{} {} does not fit the wire format", what, value)))
}

/// Bounds-checked little-endian reader
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::validation(format!(
                "truncated frame: needed {} bytes at offset {}, {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
