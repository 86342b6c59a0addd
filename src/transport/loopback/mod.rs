//! In-process cluster for tests, demos and local development
//!
//! `LoopbackCluster` serves the writer and iterator protocols over
//! [`pipe`](super::pipe) byte streams, so sessions exercise the same
//! encoding path they would against a remote node.
//!
//! - **store**: committed segments and clipping by time
//! - **cursor**: server-side iterator positioning
//! - **session**: request loops, one tokio task per stream

mod cursor;
mod session;
mod store;

use super::{pipe, Codec, EncodedStream, PipeEnd};
use crate::channel::{Channel, ChannelCache, ChannelKey};
use crate::clock::ClusterInfo;
use crate::error::{Error, Result};
use crate::iterator::{Command, Response};
use crate::segment::Segment;
use crate::telem::{TimeSpan, TimeStamp};
use crate::writer::{WriterRequest, WriterResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::Store;
use tokio::sync::RwLock;

/// Client end of a loopback writer session
pub type WriterStream = EncodedStream<PipeEnd, WriterRequest, WriterResponse>;

/// Client end of a loopback iterator session
pub type IteratorStream = EncodedStream<PipeEnd, Command, Response>;

/// In-flight messages buffered per direction
const PIPE_CAPACITY: usize = 64;

/// A single-node cluster living inside the current tokio runtime
#[derive(Clone)]
pub struct LoopbackCluster {
    address: String,
    codec: Codec,
    store: Arc<RwLock<Store>>,
    clock_offset: Arc<RwLock<TimeSpan>>,
    shutdown: Arc<AtomicBool>,
}

impl LoopbackCluster {
    pub fn new(address: impl Into<String>, codec: Codec) -> Self {
        Self {
            address: address.into(),
            codec,
            store: Arc::new(RwLock::new(Store::default())),
            clock_offset: Arc::new(RwLock::new(TimeSpan::ZERO)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Define a channel; redefining a key with different properties fails
    pub async fn create_channel(&self, channel: Channel) -> Result<()> {
        tracing::debug!(channel = %channel, "creating channel");
        self.store.write().await.create_channel(channel)
    }

    /// Snapshot of the cluster's channel definitions
    pub async fn channels(&self) -> ChannelCache {
        self.store.read().await.channels.clone()
    }

    /// Committed segments of a channel, in time order
    pub async fn committed(&self, key: ChannelKey) -> Vec<Segment> {
        self.store.read().await.segments(key).to_vec()
    }

    /// End of the last committed segment of a channel
    pub async fn high_water_mark(&self, key: ChannelKey) -> Option<TimeStamp> {
        self.store.read().await.high_water_mark(key)
    }

    /// Open a writer session
    pub fn open_writer_stream(&self) -> Result<WriterStream> {
        let (client, server) = self.connect()?;
        let server: EncodedStream<PipeEnd, WriterResponse, WriterRequest> =
            EncodedStream::new(server, self.codec);
        tokio::spawn(session::serve_writer(self.store.clone(), server));
        Ok(EncodedStream::new(client, self.codec))
    }

    /// Open an iterator session
    pub fn open_iterator_stream(&self) -> Result<IteratorStream> {
        let (client, server) = self.connect()?;
        let server: EncodedStream<PipeEnd, Response, Command> =
            EncodedStream::new(server, self.codec);
        tokio::spawn(session::serve_iterator(self.store.clone(), server));
        Ok(EncodedStream::new(client, self.codec))
    }

    /// Skew the node clock relative to the local one
    pub async fn set_clock_offset(&self, offset: TimeSpan) {
        *self.clock_offset.write().await = offset;
    }

    /// Current time as seen by the node
    pub async fn node_time(&self) -> TimeStamp {
        TimeStamp::now() + *self.clock_offset.read().await
    }

    /// Refuse new sessions; sessions already open run to completion
    pub fn shutdown(&self) {
        tracing::info!(address = %self.address, "loopback cluster shutting down");
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn connect(&self) -> Result<(PipeEnd, PipeEnd)> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(Error::Unreachable {
                address: self.address.clone(),
                message: "cluster is shut down".to_string(),
            });
        }
        Ok(pipe(self.address.clone(), PIPE_CAPACITY))
    }
}

#[async_trait]
impl ClusterInfo for LoopbackCluster {
    fn address(&self) -> &str {
        LoopbackCluster::address(self)
    }

    async fn node_time(&self) -> Result<TimeStamp> {
        Ok(LoopbackCluster::node_time(self).await)
    }
}
