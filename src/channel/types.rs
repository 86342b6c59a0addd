//! Channel descriptors
//!
//! A channel is immutable once created. Its samples are placed in time either
//! by a fixed sample rate or by the timestamps of an index channel, never both.

use crate::error::{Error, Result};
use crate::telem::{DataType, Rate, TimeSpan};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, cluster-unique channel identifier
pub type ChannelKey = u32;

/// Definition of a channel (what's being recorded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Unique identifier
    pub key: ChannelKey,
    /// Human-readable name (e.g., "engine_temp")
    pub name: String,
    /// Scalar type of every sample
    pub data_type: DataType,
    /// Fixed sample rate, for rate-based channels
    #[serde(default)]
    pub rate: Option<Rate>,
    /// Key of the index channel supplying timestamps, for indexed channels.
    /// Index channels reference themselves.
    #[serde(default)]
    pub index: Option<ChannelKey>,
    /// Whether this channel holds the timestamps for other channels
    #[serde(default)]
    pub is_index: bool,
}

/// How a channel's samples map onto time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timing {
    /// Samples are `period` apart starting at the segment start
    Rate(TimeSpan),
    /// The channel's own samples are the timestamps
    SelfIndexed,
    /// Timestamps come from another channel
    IndexedBy(ChannelKey),
}

impl Channel {
    /// Create a channel with no timing set; chain `rate` or `indexed_by`
    pub fn new(key: ChannelKey, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            key,
            name: name.into(),
            data_type,
            rate: None,
            index: None,
            is_index: false,
        }
    }

    /// Create an index channel holding nanosecond timestamps
    pub fn index(key: ChannelKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            data_type: DataType::Timestamp,
            rate: None,
            index: Some(key),
            is_index: true,
        }
    }

    /// Builder: make the channel rate-based
    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Builder: take timestamps from an index channel
    pub fn indexed_by(mut self, index: ChannelKey) -> Self {
        self.index = Some(index);
        self
    }

    /// Bytes per sample
    pub fn density(&self) -> usize {
        self.data_type.density()
    }

    /// Check that exactly one of rate or index is set and is coherent
    pub fn validate(&self) -> Result<()> {
        match (self.rate, self.index) {
            (Some(_), Some(_)) => Err(Error::validation(format!(
                "channel {} sets both a rate and an index",
                self.key
            ))),
            (None, None) => Err(Error::validation(format!(
                "channel {} must set either a rate or an index",
                self.key
            ))),
            (Some(rate), None) => {
                if self.is_index {
                    return Err(Error::validation(format!(
                        "index channel {} cannot be rate-based",
                        self.key
                    )));
                }
                if !rate.is_valid() {
                    return Err(Error::validation(format!(
                        "channel {} has invalid rate {} Hz",
                        self.key, rate.0
                    )));
                }
                Ok(())
            }
            (None, Some(index)) => {
                if self.is_index && (index != self.key || self.data_type != DataType::Timestamp) {
                    return Err(Error::validation(format!(
                        "index channel {} must be a self-indexed timestamp channel",
                        self.key
                    )));
                }
                if !self.is_index && index == self.key {
                    return Err(Error::validation(format!(
                        "channel {} indexes itself but is not an index channel",
                        self.key
                    )));
                }
                Ok(())
            }
        }
    }

    /// Timing of the channel
    pub fn timing(&self) -> Result<Timing> {
        self.validate()?;
        match (self.rate, self.index) {
            (Some(rate), _) => Ok(Timing::Rate(rate.period())),
            (None, Some(_)) if self.is_index => Ok(Timing::SelfIndexed),
            (None, Some(index)) => Ok(Timing::IndexedBy(index)),
            (None, None) => Err(Error::validation(format!(
                "channel {} has no timing source",
                self.key
            ))),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.key, self.data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_based_channel() {
        let ch = Channel::new(1, "temp", DataType::Float32).rate(Rate::hz(10.0));
        assert!(ch.validate().is_ok());
        assert_eq!(ch.density(), 4);
        assert_eq!(ch.timing().unwrap(), Timing::Rate(TimeSpan::from_millis(100)));
    }

    #[test]
    fn test_exactly_one_timing_source() {
        let both = Channel::new(1, "x", DataType::Int8)
            .rate(Rate::hz(1.0))
            .indexed_by(2);
        assert!(matches!(both.validate(), Err(Error::Validation(_))));

        let neither = Channel::new(1, "x", DataType::Int8);
        assert!(matches!(neither.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_index_channels() {
        let time = Channel::index(10, "time");
        assert!(time.validate().is_ok());
        assert_eq!(time.timing().unwrap(), Timing::SelfIndexed);

        let data = Channel::new(11, "pressure", DataType::Float64).indexed_by(10);
        assert_eq!(data.timing().unwrap(), Timing::IndexedBy(10));

        let mut bad = Channel::index(12, "bad");
        bad.data_type = DataType::Int64;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_channel_serialization() {
        let ch = Channel::new(3, "volts", DataType::Float64).rate(Rate::hz(100.0));
        let json = serde_json::to_string(&ch).unwrap();
        let restored: Channel = serde_json::from_str(&json).unwrap();
        assert_eq!(ch, restored);
    }
}
