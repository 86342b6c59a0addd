//! Server loops for loopback writer and iterator sessions

use super::cursor::Cursor;
use super::store::Store;
use crate::channel::{ChannelKey, ChannelRetriever};
use crate::error::{Error, Result};
use crate::framer::{Frame, FrameCodec};
use crate::iterator::{Command, CommandKind, Response};
use crate::segment::{Segment, SegmentBounds};
use crate::telem::TimeStamp;
use crate::transport::Stream;
use crate::writer::{WriterRequest, WriterResponse};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Serve one writer session until the client closes or goes away
///
/// Uncommitted segments are dropped when the session ends.
pub(crate) async fn serve_writer<S>(store: Arc<RwLock<Store>>, mut stream: S)
where
    S: Stream<WriterResponse, WriterRequest>,
{
    let mut codec: Option<FrameCodec> = None;
    let mut pending: Vec<Segment> = Vec::new();
    let mut last_commit: Option<TimeStamp> = None;

    loop {
        let request = match stream.receive().await {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(error = %err, pending = pending.len(), "writer session ended");
                return;
            }
        };
        let command = request.command();

        let response = match request {
            WriterRequest::Open { keys } => {
                if codec.is_some() {
                    WriterResponse::failed(command, "writer is already open")
                } else {
                    match open_writer(&store, &keys).await {
                        Ok(opened) => {
                            codec = Some(opened);
                            WriterResponse::ok(command)
                        }
                        Err(err) => WriterResponse::failed(command, err.to_string()),
                    }
                }
            }
            WriterRequest::Close => {
                let _ = stream.send(WriterResponse::ok(command)).await;
                let _ = stream.close_send().await;
                tracing::debug!(discarded = pending.len(), "writer session closed");
                return;
            }
            _ if codec.is_none() => {
                WriterResponse::failed(command, format!("{} sent before open", command))
            }
            WriterRequest::Write { segments, frame } => {
                match codec
                    .as_ref()
                    .map(|codec| accept_write(codec, segments, &frame))
                {
                    Some(Ok(accepted)) => {
                        pending.extend(accepted);
                        WriterResponse::ok(command)
                    }
                    Some(Err(err)) => WriterResponse::failed(command, err.to_string()),
                    None => WriterResponse::failed(command, "write sent before open"),
                }
            }
            WriterRequest::Commit => {
                let end = pending
                    .iter()
                    .map(|s| s.end)
                    .max()
                    .or(last_commit)
                    .unwrap_or(TimeStamp::ZERO);
                let batch = std::mem::take(&mut pending);
                let segments = batch.len();
                match store.write().await.commit(batch) {
                    Ok(()) => {
                        last_commit = Some(end);
                        tracing::debug!(segments, end = end.0, "writer committed");
                        WriterResponse::committed(end)
                    }
                    Err(err) => WriterResponse::failed(command, err.to_string()),
                }
            }
        };

        if stream.send(response).await.is_err() {
            return;
        }
    }
}

async fn open_writer(store: &Arc<RwLock<Store>>, keys: &[ChannelKey]) -> Result<FrameCodec> {
    if keys.is_empty() {
        return Err(Error::validation("writer must be opened on at least one channel"));
    }
    let data_types = store.read().await.channels.data_types(keys)?;
    Ok(FrameCodec::new(keys.to_vec(), data_types))
}

fn accept_write(
    codec: &FrameCodec,
    segments: Vec<SegmentBounds>,
    frame: &[u8],
) -> Result<Vec<Segment>> {
    let frame = codec.decode_frame(frame)?;
    if frame.len() != segments.len() {
        return Err(Error::validation(format!(
            "write describes {} segments but carries {} series",
            segments.len(),
            frame.len()
        )));
    }
    let mut series: Vec<_> = frame.into_iter().collect();
    let mut accepted = Vec::with_capacity(segments.len());
    for bounds in segments {
        let position = series
            .iter()
            .position(|(k, _)| *k == bounds.key)
            .ok_or_else(|| {
                Error::validation(format!("segment for channel {} has no series", bounds.key))
            })?;
        let (_, data) = series.swap_remove(position);
        accepted.push(Segment::with_bounds(bounds, data));
    }
    Ok(accepted)
}

/// Serve one iterator session until the client closes or goes away
pub(crate) async fn serve_iterator<S>(store: Arc<RwLock<Store>>, mut stream: S)
where
    S: Stream<Response, Command>,
{
    let mut cursor: Option<Cursor> = None;

    loop {
        let command = match stream.receive().await {
            Ok(command) => command,
            Err(err) => {
                tracing::debug!(error = %err, "iterator session ended");
                return;
            }
        };
        let kind = command.kind();

        let responses = match command {
            Command::Close => {
                let _ = stream.send(Response::ack(kind, true)).await;
                let _ = stream.close_send().await;
                return;
            }
            Command::Open { keys, range } => {
                if cursor.is_some() {
                    vec![Response::failed(kind, "iterator is already open")]
                } else {
                    let store = store.read().await;
                    match Cursor::open(&store, keys, range) {
                        Ok((opened, has_data)) => {
                            cursor = Some(opened);
                            vec![Response::ack(kind, has_data)]
                        }
                        Err(err) => vec![Response::failed(kind, err.to_string())],
                    }
                }
            }
            command => match cursor.as_mut() {
                None => vec![Response::failed(kind, format!("{} sent before open", kind))],
                Some(cursor) if kind == CommandKind::Valid => {
                    vec![Response::ack(kind, cursor.valid())]
                }
                Some(cursor) => {
                    let store = store.read().await;
                    match cursor
                        .exec(&store, &command)
                        .and_then(|(segments, ok)| data_responses(segments, kind, ok))
                    {
                        Ok(responses) => responses,
                        Err(err) => vec![Response::failed(kind, err.to_string())],
                    }
                }
            },
        };

        for response in responses {
            if stream.send(response).await.is_err() {
                return;
            }
        }
    }
}

/// Pack segments into data responses holding at most one segment per channel,
/// followed by the acknowledgement
fn data_responses(segments: Vec<Segment>, kind: CommandKind, ok: bool) -> Result<Vec<Response>> {
    let mut batches: Vec<Vec<Segment>> = Vec::new();
    for segment in segments {
        match batches
            .iter_mut()
            .find(|batch| batch.iter().all(|s| s.key != segment.key))
        {
            Some(batch) => batch.push(segment),
            None => batches.push(vec![segment]),
        }
    }

    let mut responses = Vec::with_capacity(batches.len() + 1);
    for batch in batches {
        let bounds = batch.iter().map(Segment::bounds).collect();
        let frame = Frame::from_pairs(batch.into_iter().map(|s| (s.key, s.series)))?;
        responses.push(Response::Data {
            segments: bounds,
            frame: FrameCodec::encode(&frame)?,
        });
    }
    responses.push(Response::ack(kind, ok));
    Ok(responses)
}
