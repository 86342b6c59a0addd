//! Client side of a remote iteration session
//!
//! The cursor lives on the server. The client sends one command at a time,
//! collects the `Data` responses that precede the command's `Ack`, and keeps
//! only the segments of the latest command as its value.

use super::messages::{Command, CommandKind, Response};
use super::state::IteratorState;
use crate::channel::{ChannelKey, ChannelRetriever};
use crate::error::{Error, Result};
use crate::framer::{Frame, FrameCodec};
use crate::segment::{Segment, SegmentBounds};
use crate::telem::{Series, TimeRange, TimeSpan, TimeStamp};
use crate::transport::Stream;
use uuid::Uuid;

/// Span value asking the server to move by one stored segment
pub const AUTO_SPAN: TimeSpan = TimeSpan::ZERO;

/// Command-driven iterator over committed segments
pub struct SegmentIterator<S> {
    stream: S,
    session: Uuid,
    state: IteratorState,
    codec: FrameCodec,
    value: Vec<Segment>,
    error: Option<Error>,
}

impl<S> SegmentIterator<S>
where
    S: Stream<Command, Response>,
{
    /// Wrap a stream; nothing is sent until [`open`](Self::open)
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            session: Uuid::new_v4(),
            state: IteratorState::Unopened,
            codec: FrameCodec::default(),
            value: Vec::new(),
            error: None,
        }
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Error that moved the session to `Errored`, if any
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn stream(&self) -> &S {
        &self.stream
    }

    /// Segments delivered by the most recent positional command
    pub fn value(&self) -> &[Segment] {
        &self.value
    }

    /// Current value merged into one frame, concatenating per channel
    pub fn value_frame(&self) -> Result<Frame> {
        let mut frame = Frame::new();
        let mut keys: Vec<ChannelKey> = Vec::new();
        let mut merged = Vec::new();
        for seg in &self.value {
            match keys.iter().position(|k| *k == seg.key) {
                Some(i) => {
                    let series: &mut Series = &mut merged[i];
                    series.extend(&seg.series)?;
                }
                None => {
                    keys.push(seg.key);
                    merged.push(seg.series.clone());
                }
            }
        }
        for (key, series) in keys.into_iter().zip(merged) {
            frame.push(key, series)?;
        }
        Ok(frame)
    }

    /// Open the remote cursor over `keys` within `range`
    ///
    /// Returns whether the range holds any data.
    pub async fn open(
        &mut self,
        retriever: &dyn ChannelRetriever,
        keys: &[ChannelKey],
        range: TimeRange,
    ) -> Result<bool> {
        match self.state {
            IteratorState::Unopened => {}
            IteratorState::Errored => return Err(self.captured()),
            IteratorState::Closed => return Err(Error::unexpected("iterator is closed")),
            state => {
                return Err(self.fail(Error::unexpected(format!(
                    "open sent to an iterator that is already {}",
                    state
                ))))
            }
        }

        let command = Command::Open {
            keys: keys.to_vec(),
            range,
        };
        command.validate()?;
        let data_types = retriever.data_types(keys)?;

        self.state = IteratorState::Open;
        if let Err(err) = self.stream.send(command).await {
            return Err(self.fail(err));
        }
        let response = match self.stream.receive().await {
            Ok(response) => response,
            Err(err) => return Err(self.fail(err)),
        };

        match response {
            Response::Ack {
                command: CommandKind::Open,
                ok,
                error: None,
            } => {
                self.codec = FrameCodec::new(keys.to_vec(), data_types);
                self.state = if ok {
                    IteratorState::Iterating
                } else {
                    IteratorState::Exhausted
                };
                tracing::debug!(
                    session = %self.session,
                    channels = keys.len(),
                    %range,
                    has_data = ok,
                    "iterator opened"
                );
                Ok(ok)
            }
            Response::Ack {
                command: CommandKind::Open,
                error: Some(message),
                ..
            } => Err(self.fail(Error::Remote(message))),
            other => Err(self.fail(Error::unexpected(format!(
                "expected open acknowledgement, got {:?}",
                other
            )))),
        }
    }

    /// Advance by `span`, or to the next stored segment with [`AUTO_SPAN`]
    pub async fn next(&mut self, span: TimeSpan) -> Result<bool> {
        self.exec(Command::Next { span }).await
    }

    /// Retreat by `span`, or to the previous stored segment with [`AUTO_SPAN`]
    pub async fn prev(&mut self, span: TimeSpan) -> Result<bool> {
        self.exec(Command::Prev { span }).await
    }

    pub async fn first(&mut self) -> Result<bool> {
        self.exec(Command::First).await
    }

    pub async fn last(&mut self) -> Result<bool> {
        self.exec(Command::Last).await
    }

    pub async fn next_span(&mut self, span: TimeSpan) -> Result<bool> {
        self.exec(Command::NextSpan { span }).await
    }

    pub async fn prev_span(&mut self, span: TimeSpan) -> Result<bool> {
        self.exec(Command::PrevSpan { span }).await
    }

    pub async fn next_range(&mut self, range: TimeRange) -> Result<bool> {
        self.exec(Command::NextRange { range }).await
    }

    pub async fn seek_first(&mut self) -> Result<bool> {
        self.exec(Command::SeekFirst).await
    }

    pub async fn seek_last(&mut self) -> Result<bool> {
        self.exec(Command::SeekLast).await
    }

    pub async fn seek_lt(&mut self, stamp: TimeStamp) -> Result<bool> {
        self.exec(Command::SeekLt { stamp }).await
    }

    pub async fn seek_ge(&mut self, stamp: TimeStamp) -> Result<bool> {
        self.exec(Command::SeekGe { stamp }).await
    }

    /// Whether the cursor currently points at data
    pub async fn valid(&mut self) -> Result<bool> {
        self.exec(Command::Valid).await
    }

    /// Release the remote cursor; a no-op once closed
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            IteratorState::Closed => return Ok(()),
            IteratorState::Unopened => {
                self.state = IteratorState::Closed;
                return Ok(());
            }
            IteratorState::Errored => {
                // the stream already failed; only release our half
                if let Err(err) = self.stream.close_send().await {
                    tracing::debug!(session = %self.session, error = %err, "close after failure");
                }
                self.state = IteratorState::Closed;
                return Ok(());
            }
            _ => {}
        }

        self.value.clear();
        let result = self.close_remote().await;
        self.state = IteratorState::Closed;
        tracing::debug!(session = %self.session, ok = result.is_ok(), "iterator closed");
        result
    }

    async fn close_remote(&mut self) -> Result<()> {
        self.stream.send(Command::Close).await?;
        loop {
            match self.stream.receive().await? {
                Response::Ack {
                    command: CommandKind::Close,
                    error: None,
                    ..
                } => break,
                Response::Ack {
                    command: CommandKind::Close,
                    error: Some(message),
                    ..
                } => return Err(Error::Remote(message)),
                other => {
                    tracing::debug!(session = %self.session, ?other, "discarding response while closing");
                }
            }
        }
        self.stream.close_send().await
    }

    async fn exec(&mut self, command: Command) -> Result<bool> {
        let kind = command.kind();
        let state = self.state;
        if !state.accepts_commands() {
            return Err(match state {
                IteratorState::Errored => self.captured(),
                IteratorState::Closed => {
                    Error::unexpected(format!("{} sent to a closed iterator", kind))
                }
                _ => self.fail(Error::unexpected(format!(
                    "{} sent before the iterator was opened",
                    kind
                ))),
            });
        }
        command.validate()?;

        if kind.is_positional() {
            self.value.clear();
        }
        if let Err(err) = self.stream.send(command).await {
            return Err(self.fail(err));
        }

        loop {
            let response = match self.stream.receive().await {
                Ok(response) => response,
                Err(err) => return Err(self.fail(err)),
            };
            match response {
                Response::Data { segments, frame } => {
                    if !kind.is_positional() {
                        return Err(self.fail(Error::unexpected(format!(
                            "received data in response to {}",
                            kind
                        ))));
                    }
                    if let Err(err) = self.accept_data(segments, &frame) {
                        return Err(self.fail(err));
                    }
                }
                Response::Ack {
                    ok,
                    command,
                    error,
                } => {
                    if command != kind {
                        return Err(self.fail(Error::unexpected(format!(
                            "received {} acknowledgement while waiting on {}",
                            command, kind
                        ))));
                    }
                    if let Some(message) = error {
                        return Err(self.fail(Error::Remote(message)));
                    }
                    if !kind.is_positional() {
                        return Ok(ok);
                    }
                    self.state = if ok {
                        IteratorState::Iterating
                    } else {
                        IteratorState::Exhausted
                    };
                    tracing::trace!(
                        session = %self.session,
                        command = %kind,
                        ok,
                        segments = self.value.len(),
                        "iterator command acknowledged"
                    );
                    return Ok(ok);
                }
            }
        }
    }

    fn accept_data(&mut self, segments: Vec<SegmentBounds>, frame: &[u8]) -> Result<()> {
        let frame = self.codec.decode_frame(frame)?;
        if frame.len() != segments.len() {
            return Err(Error::validation(format!(
                "data response describes {} segments but carries {} series",
                segments.len(),
                frame.len()
            )));
        }
        let mut series_by_key: Vec<_> = frame.into_iter().collect();
        for bounds in segments {
            let position = series_by_key
                .iter()
                .position(|(k, _)| *k == bounds.key)
                .ok_or_else(|| {
                    Error::validation(format!(
                        "segment for channel {} has no series in frame",
                        bounds.key
                    ))
                })?;
            let (_, series) = series_by_key.swap_remove(position);
            self.value.push(Segment::with_bounds(bounds, series));
        }
        Ok(())
    }

    /// Record a fatal error and move to `Errored`
    fn fail(&mut self, err: Error) -> Error {
        tracing::warn!(session = %self.session, error = %err, state = %self.state, "iterator failed");
        self.state = IteratorState::Errored;
        self.error = Some(err.clone());
        err
    }

    fn captured(&self) -> Error {
        self.error
            .clone()
            .unwrap_or_else(|| Error::unexpected("iterator is in an errored state"))
    }
}
