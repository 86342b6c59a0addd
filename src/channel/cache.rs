//! Read-only channel metadata lookup
//!
//! The cluster owns channel definitions. Sessions resolve keys through a
//! `ChannelRetriever` before validating or decoding anything; the cache has no
//! invalidation protocol of its own.

use super::types::{Channel, ChannelKey};
use crate::error::{Error, Result};
use crate::telem::DataType;
use std::collections::HashMap;

/// Resolves channel definitions by key
pub trait ChannelRetriever: Send + Sync {
    /// Look up a single channel
    fn retrieve(&self, key: ChannelKey) -> Result<Channel>;

    /// Look up several channels, preserving order
    fn retrieve_many(&self, keys: &[ChannelKey]) -> Result<Vec<Channel>> {
        keys.iter().map(|k| self.retrieve(*k)).collect()
    }

    /// Data types of `keys`, index-aligned
    fn data_types(&self, keys: &[ChannelKey]) -> Result<Vec<DataType>> {
        Ok(self
            .retrieve_many(keys)?
            .into_iter()
            .map(|ch| ch.data_type)
            .collect())
    }
}

/// In-memory channel cache keyed by channel key
#[derive(Debug, Clone, Default)]
pub struct ChannelCache {
    channels: HashMap<ChannelKey, Channel>,
    by_name: HashMap<String, ChannelKey>,
}

impl ChannelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from channel definitions, validating each one
    pub fn from_channels(channels: impl IntoIterator<Item = Channel>) -> Result<Self> {
        let mut cache = Self::new();
        for ch in channels {
            cache.insert(ch)?;
        }
        Ok(cache)
    }

    /// Add a channel; keys are immutable once cached
    pub fn insert(&mut self, channel: Channel) -> Result<()> {
        channel.validate()?;
        if let Some(existing) = self.channels.get(&channel.key) {
            if existing != &channel {
                return Err(Error::validation(format!(
                    "channel {} is already defined as {}",
                    channel.key, existing
                )));
            }
            return Ok(());
        }
        self.by_name.insert(channel.name.clone(), channel.key);
        self.channels.insert(channel.key, channel);
        Ok(())
    }

    pub fn get(&self, key: ChannelKey) -> Option<&Channel> {
        self.channels.get(&key)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Channel> {
        self.by_name.get(name).and_then(|k| self.channels.get(k))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }
}

impl ChannelRetriever for ChannelCache {
    fn retrieve(&self, key: ChannelKey) -> Result<Channel> {
        self.channels
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::validation(format!("channel {} not found", key)))
    }
}
