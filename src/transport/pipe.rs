//! In-process byte stream built on tokio channels

use super::ByteStream;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One end of an in-process duplex pipe
pub struct PipeEnd {
    address: String,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

/// Create a connected pair of pipe ends
///
/// `capacity` bounds the number of in-flight messages per direction.
pub fn pipe(address: impl Into<String>, capacity: usize) -> (PipeEnd, PipeEnd) {
    let address = address.into();
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);
    (
        PipeEnd {
            address: address.clone(),
            tx: Some(a_tx),
            rx: a_rx,
        },
        PipeEnd {
            address,
            tx: Some(b_tx),
            rx: b_rx,
        },
    )
}

impl PipeEnd {
    fn stream_error(&self, message: impl Into<String>) -> Error {
        Error::Stream {
            address: self.address.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ByteStream for PipeEnd {
    fn address(&self) -> &str {
        &self.address
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| self.stream_error("send side already closed"))?;
        if tx.send(payload).await.is_err() {
            return Err(self.stream_error("stream closed by peer"));
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        match self.rx.recv().await {
            Some(payload) => Ok(payload),
            None => Err(self.stream_error("stream closed")),
        }
    }

    async fn close_send(&mut self) -> Result<()> {
        self.tx.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipe_duplex() {
        let (mut a, mut b) = pipe("pipe:1", 2);
        a.send(vec![1, 2]).await.unwrap();
        b.send(vec![3]).await.unwrap();
        assert_eq!(b.receive().await.unwrap(), vec![1, 2]);
        assert_eq!(a.receive().await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_close_send_ends_peer_receive() {
        let (mut a, mut b) = pipe("pipe:2", 2);
        a.close_send().await.unwrap();
        let err = b.receive().await.unwrap_err();
        assert_eq!(
            err,
            Error::Stream {
                address: "pipe:2".to_string(),
                message: "stream closed".to_string(),
            }
        );
        assert!(a.send(vec![1]).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_peer_fails_send() {
        let (mut a, b) = pipe("pipe:3", 2);
        drop(b);
        assert!(matches!(a.send(vec![1]).await, Err(Error::Stream { .. })));
    }
}
