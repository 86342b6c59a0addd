//! Transport boundary
//!
//! The socket layer is not part of this crate. Sessions talk to a
//! [`Stream`] of typed requests and responses; [`EncodedStream`] adapts any
//! framed [`ByteStream`] into one by applying a [`Codec`].
//!
//! ```text
//! SegmentWriter / SegmentIterator
//!         │  Stream<Req, Res>
//!   EncodedStream (json | msgpack)
//!         │  ByteStream
//!   socket, pipe, loopback ...
//! ```

pub mod codec;
pub mod loopback;
pub mod pipe;

pub use codec::Codec;
pub use loopback::LoopbackCluster;
pub use pipe::{pipe, PipeEnd};

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// A bidirectional stream of already-framed byte messages
#[async_trait]
pub trait ByteStream: Send {
    /// Address of the remote end, used to annotate errors
    fn address(&self) -> &str;

    async fn send(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Wait for the next message; fails once the stream is closed
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Signal that no more messages will be sent
    async fn close_send(&mut self) -> Result<()>;
}

/// A bidirectional stream of typed protocol messages
#[async_trait]
pub trait Stream<Req, Res>: Send
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn address(&self) -> &str;

    async fn send(&mut self, request: Req) -> Result<()>;

    async fn receive(&mut self) -> Result<Res>;

    async fn close_send(&mut self) -> Result<()>;
}

/// Typed stream over a byte stream with a fixed content encoding
pub struct EncodedStream<B, Req, Res> {
    inner: B,
    codec: Codec,
    _messages: PhantomData<fn(Req) -> Res>,
}

impl<B: ByteStream, Req, Res> EncodedStream<B, Req, Res> {
    pub fn new(inner: B, codec: Codec) -> Self {
        Self {
            inner,
            codec,
            _messages: PhantomData,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

#[async_trait]
impl<B, Req, Res> Stream<Req, Res> for EncodedStream<B, Req, Res>
where
    B: ByteStream,
    Req: Serialize + Send + Sync + 'static,
    Res: DeserializeOwned + Send + 'static,
{
    fn address(&self) -> &str {
        self.inner.address()
    }

    async fn send(&mut self, request: Req) -> Result<()> {
        let payload = self.codec.encode(&request)?;
        self.inner.send(payload).await
    }

    async fn receive(&mut self) -> Result<Res> {
        let payload = self.inner.receive().await?;
        self.codec.decode(&payload)
    }

    async fn close_send(&mut self) -> Result<()> {
        self.inner.close_send().await
    }
}
