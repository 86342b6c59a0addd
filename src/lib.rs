//! # Telemetry Client
//!
//! Client side of a segment transport protocol for a time-series telemetry
//! cluster: validated, size-bounded writes and command-driven remote
//! iteration over committed data.
//!
//! ## Features
//!
//! - **Validated writes**: scalar type and temporal contiguity checks before any network effect
//! - **Bounded payloads**: writes are split on sample boundaries to fit a frame limit
//! - **Remote iteration**: a client state machine over a server-resident cursor
//! - **Compact framing**: length-prefixed binary frames for multi-channel payloads
//! - **Clock checks**: midpoint-based skew estimation against cluster nodes
//!
//! ## Modules
//!
//! - [`telem`]: time, data types and sample series
//! - [`channel`]: channel descriptors and lookup
//! - [`validate`]: scalar and contiguity validators
//! - [`framer`]: frames and their binary codec
//! - [`transport`]: stream boundary, codecs and the in-process loopback cluster
//! - [`writer`]: the segment writer session
//! - [`iterator`]: the segment iterator session
//! - [`clock`]: clock skew and connectivity checks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use telemetry_client::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let cluster = LoopbackCluster::new("localhost:9090", Codec::Msgpack);
//!     cluster
//!         .create_channel(Channel::new(1, "engine_temp", DataType::Float64).rate(Rate::hz(100.0)))
//!         .await?;
//!     let channels = cluster.channels().await;
//!
//!     // Write one second of data and commit it
//!     let mut writer = SegmentWriter::new(cluster.open_writer_stream()?, WriterConfig::default());
//!     writer.open(&channels, &[1]).await?;
//!     writer.write(1, Series::new(vec![21.5f64; 100]), TimeStamp::ZERO).await?;
//!     writer.commit().await?;
//!     writer.close().await?;
//!
//!     // Read it back segment by segment
//!     let mut iter = SegmentIterator::new(cluster.open_iterator_stream()?);
//!     iter.open(&channels, &[1], TimeRange::MAX).await?;
//!     iter.seek_first().await?;
//!     while iter.next(AUTO_SPAN).await? {
//!         for segment in iter.value() {
//!             println!("{} samples in {}", segment.len(), segment.range());
//!         }
//!     }
//!     iter.close().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod framer;
pub mod iterator;
pub mod segment;
pub mod telem;
pub mod transport;
pub mod validate;
pub mod writer;

// Re-export top-level types for convenience
pub use error::{Error, Result};

pub use telem::{DataType, Rate, Sample, Series, TimeRange, TimeSpan, TimeStamp};

pub use channel::{Channel, ChannelCache, ChannelKey, ChannelRetriever, Timing};

pub use segment::{Segment, SegmentBounds, Stamps};

pub use validate::{ContiguityConfig, ContiguityValidator, HighWaterMarks, ScalarTypeValidator};

pub use framer::{Frame, FrameCodec};

pub use transport::{ByteStream, Codec, EncodedStream, LoopbackCluster, Stream};

pub use writer::{SegmentWriter, WriterConfig, WriterState};

pub use iterator::{IteratorState, SegmentIterator, AUTO_SPAN};

pub use clock::{ClockSkewCalculator, ClusterInfo, ConnectivityChecker, ConnectivityReport};

pub use config::{Config, ConfigError};
