//! Channel metadata
//!
//! - **types**: `Channel` descriptors and their `Timing`
//! - **cache**: the read-only `ChannelRetriever` boundary and `ChannelCache`

pub mod cache;
pub mod types;

pub use cache::{ChannelCache, ChannelRetriever};
pub use types::{Channel, ChannelKey, Timing};
