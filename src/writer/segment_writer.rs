//! Client side of a write session
//!
//! Every write goes through the same pipeline before touching the network:
//!
//! ```text
//! series ─▶ scalar check ─▶ segment (derive end) ─▶ split by payload limit
//!        ─▶ contiguity check (whole batch) ─▶ pack frames ─▶ Write + ack
//! ```
//!
//! Validation failures leave the session usable. Transport and protocol
//! failures move it to `Errored`.

use super::messages::{WriterCommand, WriterRequest, WriterResponse};
use crate::channel::{Channel, ChannelKey, ChannelRetriever, Timing};
use crate::error::{Error, Result};
use crate::framer::{Frame, FrameCodec, FRAME_HEADER_SIZE, PAYLOAD_HEADER_SIZE};
use crate::segment::{Segment, Stamps};
use crate::telem::{Series, TimeStamp};
use crate::transport::Stream;
use crate::validate::{ContiguityConfig, ContiguityValidator, ScalarTypeValidator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Writer session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Upper bound on the encoded size of one frame
    pub max_payload_bytes: usize,
    /// Commit after every successful write
    pub auto_commit: bool,
    pub allow_no_high_water_mark: bool,
    pub allow_overlap: bool,
    pub allow_gap: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 4 * 1024 * 1024, // 4MB
            auto_commit: false,
            allow_no_high_water_mark: true,
            allow_overlap: false,
            allow_gap: false,
        }
    }
}

impl WriterConfig {
    pub fn contiguity(&self) -> ContiguityConfig {
        ContiguityConfig {
            allow_no_high_water_mark: self.allow_no_high_water_mark,
            allow_overlap: self.allow_overlap,
            allow_gap: self.allow_gap,
        }
    }

    /// Most samples of `density` bytes that fit in one frame
    pub fn max_samples(&self, density: usize) -> usize {
        self.max_payload_bytes
            .saturating_sub(FRAME_HEADER_SIZE + PAYLOAD_HEADER_SIZE)
            / density.max(1)
    }
}

/// Lifecycle state of a [`SegmentWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Unopened,
    Open,
    Errored,
    Closed,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterState::Unopened => write!(f, "unopened"),
            WriterState::Open => write!(f, "open"),
            WriterState::Errored => write!(f, "errored"),
            WriterState::Closed => write!(f, "closed"),
        }
    }
}

/// Validating, splitting writer over a [`Stream`]
pub struct SegmentWriter<S> {
    stream: S,
    session: Uuid,
    config: WriterConfig,
    state: WriterState,
    channels: HashMap<ChannelKey, Channel>,
    scalar: ScalarTypeValidator,
    contiguity: ContiguityValidator,
    /// Most recent timestamps written per index channel, keyed by write start
    index_stamps: HashMap<ChannelKey, (TimeStamp, Vec<TimeStamp>)>,
    error: Option<Error>,
}

impl<S> SegmentWriter<S>
where
    S: Stream<WriterRequest, WriterResponse>,
{
    pub fn new(stream: S, config: WriterConfig) -> Self {
        let contiguity = ContiguityValidator::new(config.contiguity());
        Self {
            stream,
            session: Uuid::new_v4(),
            config,
            state: WriterState::Unopened,
            channels: HashMap::new(),
            scalar: ScalarTypeValidator::new(),
            contiguity,
            index_stamps: HashMap::new(),
            error: None,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn high_water_mark(&self, key: ChannelKey) -> Option<TimeStamp> {
        self.contiguity.high_water_mark(key)
    }

    /// Start a channel's high-water mark at a known end, such as the last committed one
    pub fn seed(&mut self, key: ChannelKey, stamp: TimeStamp) {
        self.contiguity.seed(key, stamp);
    }

    /// Open the session on `keys`; calling it again while open is a no-op
    pub async fn open(&mut self, retriever: &dyn ChannelRetriever, keys: &[ChannelKey]) -> Result<()> {
        match self.state {
            WriterState::Unopened => {}
            WriterState::Open => return Ok(()),
            WriterState::Errored => return Err(self.captured()),
            WriterState::Closed => return Err(Error::unexpected("writer is closed")),
        }
        if keys.is_empty() {
            return Err(Error::validation("writer must be opened on at least one channel"));
        }
        let channels = retriever.retrieve_many(keys)?;
        for channel in &channels {
            channel.validate()?;
        }

        self.request(WriterRequest::Open {
            keys: keys.to_vec(),
        })
        .await?;
        self.channels = channels.into_iter().map(|ch| (ch.key, ch)).collect();
        self.state = WriterState::Open;
        tracing::debug!(session = %self.session, channels = keys.len(), "writer opened");
        Ok(())
    }

    /// Write one channel's samples starting at `start`
    pub async fn write(&mut self, key: ChannelKey, series: Series, start: TimeStamp) -> Result<()> {
        self.write_frame(Frame::single(key, series), start).await
    }

    /// Write several channels' samples, all starting at `start`
    ///
    /// Index channels in the frame are processed first so that channels
    /// indexed by them can resolve their timestamps.
    pub async fn write_frame(&mut self, frame: Frame, start: TimeStamp) -> Result<()> {
        self.ensure_open()?;

        let mut entries: Vec<(Channel, Series)> = Vec::with_capacity(frame.len());
        for (key, series) in frame {
            let channel = self.channels.get(&key).cloned().ok_or_else(|| {
                Error::validation(format!("channel {} is not part of this writer", key))
            })?;
            self.scalar.validate(&channel, &series)?;
            entries.push((channel, series));
        }
        entries.sort_by_key(|(channel, _)| !channel.is_index);

        let mut index_stamps = HashMap::new();
        let mut segments = Vec::new();
        for (channel, series) in entries {
            let owned: Vec<TimeStamp>;
            let stamps = match channel.timing()? {
                Timing::Rate(period) => Stamps::Rate(period),
                Timing::SelfIndexed => {
                    owned = series.values::<TimeStamp>()?;
                    Stamps::Explicit(&owned)
                }
                Timing::IndexedBy(index) => {
                    owned = self.indexed_stamps(&index_stamps, index, start)?;
                    Stamps::Explicit(&owned)
                }
            };
            stamps.check(start, series.len())?;
            if let Stamps::Explicit(explicit) = stamps {
                if channel.is_index {
                    index_stamps.insert(channel.key, explicit.to_vec());
                }
            }
            let max_samples = self.config.max_samples(channel.density());
            let segment = Segment::new(channel.key, start, series, &stamps);
            segments.extend(segment.split(&stamps, max_samples)?);
        }

        self.contiguity.validate_batch(&segments)?;
        for (key, stamps) in index_stamps {
            self.index_stamps.insert(key, (start, stamps));
        }

        let batches = pack(segments, self.config.max_payload_bytes);
        let frames = batches.len();
        for batch in batches {
            let bounds = batch.iter().map(Segment::bounds).collect();
            let frame = Frame::from_pairs(batch.into_iter().map(|s| (s.key, s.series)))?;
            let frame = FrameCodec::encode(&frame)?;
            self.request(WriterRequest::Write {
                segments: bounds,
                frame,
            })
            .await?;
        }
        tracing::trace!(session = %self.session, start = start.0, frames, "write acknowledged");

        if self.config.auto_commit {
            self.commit().await?;
        }
        Ok(())
    }

    /// Make all acknowledged writes durable, returning the commit timestamp
    pub async fn commit(&mut self) -> Result<TimeStamp> {
        self.ensure_open()?;
        let response = self.request(WriterRequest::Commit).await?;
        match response.end {
            Some(end) => {
                tracing::debug!(session = %self.session, end = end.0, "writer committed");
                Ok(end)
            }
            None => Err(self.fail(Error::unexpected("commit acknowledged without an end timestamp"))),
        }
    }

    /// End the session; uncommitted writes are discarded by the server
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Unopened | WriterState::Errored => {
                self.state = WriterState::Closed;
                return Ok(());
            }
            WriterState::Open => {}
        }
        let result = match self.request(WriterRequest::Close).await {
            Ok(_) => self.stream.close_send().await,
            Err(err) => Err(err),
        };
        self.state = WriterState::Closed;
        tracing::debug!(session = %self.session, ok = result.is_ok(), "writer closed");
        result
    }

    /// Timestamps for a channel indexed by `index`, from this frame or an earlier write
    fn indexed_stamps(
        &self,
        in_frame: &HashMap<ChannelKey, Vec<TimeStamp>>,
        index: ChannelKey,
        start: TimeStamp,
    ) -> Result<Vec<TimeStamp>> {
        if let Some(stamps) = in_frame.get(&index) {
            return Ok(stamps.clone());
        }
        match self.index_stamps.get(&index) {
            Some((written_at, stamps)) if *written_at == start => Ok(stamps.clone()),
            _ => Err(Error::validation(format!(
                "no timestamps written to index channel {} at {}",
                index, start.0
            ))),
        }
    }

    /// Send one request and wait for its acknowledgement
    async fn request(&mut self, request: WriterRequest) -> Result<WriterResponse> {
        let command = request.command();
        if let Err(err) = self.stream.send(request).await {
            return Err(self.fail(err));
        }
        let response = match self.stream.receive().await {
            Ok(response) => response,
            Err(err) => return Err(self.fail(err)),
        };
        if response.command != command {
            return Err(self.fail(Error::unexpected(format!(
                "received {} acknowledgement while waiting on {}",
                response.command, command
            ))));
        }
        if !response.ok {
            let message = response
                .error
                .unwrap_or_else(|| format!("{} rejected", command));
            return Err(self.fail(Error::Remote(message)));
        }
        Ok(response)
    }

    fn ensure_open(&mut self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Errored => Err(self.captured()),
            WriterState::Closed => Err(Error::unexpected("writer is closed")),
            WriterState::Unopened => Err(Error::unexpected("writer has not been opened")),
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        tracing::warn!(session = %self.session, error = %err, state = %self.state, "writer failed");
        self.state = WriterState::Errored;
        self.error = Some(err.clone());
        err
    }

    fn captured(&self) -> Error {
        self.error
            .clone()
            .unwrap_or_else(|| Error::unexpected("writer is in an errored state"))
    }
}

/// Group segments into frames holding at most one segment per channel and no
/// more than `max_payload_bytes` once encoded
fn pack(segments: Vec<Segment>, max_payload_bytes: usize) -> Vec<Vec<Segment>> {
    let mut batches: Vec<Vec<Segment>> = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut size = FRAME_HEADER_SIZE;
    for segment in segments {
        let added = PAYLOAD_HEADER_SIZE + segment.series.byte_len();
        let clash = current.iter().any(|s| s.key == segment.key);
        if !current.is_empty() && (clash || size + added > max_payload_bytes) {
            batches.push(std::mem::take(&mut current));
            size = FRAME_HEADER_SIZE;
        }
        size += added;
        current.push(segment);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
