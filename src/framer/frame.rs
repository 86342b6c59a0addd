//! Multi-channel frames

use crate::channel::ChannelKey;
use crate::error::{Error, Result};
use crate::telem::{DataType, Series};

/// An ordered set of `(channel key, series)` pairs sent as one network unit
///
/// Keys are unique within a frame. Equality ignores channel order.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    entries: Vec<(ChannelKey, Series)>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame holding a single channel
    pub fn single(key: ChannelKey, series: Series) -> Self {
        Self {
            entries: vec![(key, series)],
        }
    }

    /// Build a frame from pairs, rejecting duplicate keys
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ChannelKey, Series)>) -> Result<Self> {
        let mut frame = Self::new();
        for (key, series) in pairs {
            frame.push(key, series)?;
        }
        Ok(frame)
    }

    /// Append a channel's series
    pub fn push(&mut self, key: ChannelKey, series: Series) -> Result<()> {
        if self.contains(key) {
            return Err(Error::validation(format!(
                "duplicate channel key {} in frame",
                key
            )));
        }
        self.entries.push((key, series));
        Ok(())
    }

    pub fn contains(&self, key: ChannelKey) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    pub fn get(&self, key: ChannelKey) -> Option<&Series> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, s)| s)
    }

    pub fn keys(&self) -> Vec<ChannelKey> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.entries.iter().map(|(_, s)| s.data_type()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ChannelKey, Series)> {
        self.entries.iter()
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total samples across all channels
    pub fn sample_count(&self) -> usize {
        self.entries.iter().map(|(_, s)| s.len()).sum()
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, s)| other.get(*k).is_some_and(|o| o == s))
    }
}

impl IntoIterator for Frame {
    type Item = (ChannelKey, Series);
    type IntoIter = std::vec::IntoIter<(ChannelKey, Series)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
