//! Stream protocol encoder.
//!
//! Per-request state machine `INIT -> STREAMING -> {COMPLETED, ERRORED}`,
//! enforced by construction: `ProtocolEncoder` (INIT) accepts no frames and
//! must be consumed by `begin()`; the terminal transitions consume the
//! `StreamingEncoder`, so no frame can follow them and the channel sender is
//! dropped exactly once, closing the transport.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use beacon_core::models::{Document, StreamFrame};

/// How long a terminal frame send may wait on a full channel. A consumer
/// that stopped reading must not hold the turn open past its terminal
/// transition; after the grace the frame is dropped and the transport
/// closes anyway.
const TERMINAL_SEND_GRACE: Duration = Duration::from_secs(1);

/// The consumer stopped reading (client disconnect or cancellation).
/// Producers should stop emitting; this is not a turn failure by itself.
#[derive(Debug, PartialEq, Eq)]
pub struct StreamClosed;

/// INIT state: pre-validation, no frames may be written yet.
pub struct ProtocolEncoder {
    tx: mpsc::Sender<StreamFrame>,
    message_id: String,
}

impl ProtocolEncoder {
    pub fn new(tx: mpsc::Sender<StreamFrame>, message_id: impl Into<String>) -> Self {
        Self {
            tx,
            message_id: message_id.into(),
        }
    }

    /// Enter STREAMING. Only a streaming encoder can emit frames.
    pub fn begin(self) -> StreamingEncoder {
        StreamingEncoder {
            tx: self.tx,
            message_id: self.message_id,
        }
    }
}

/// STREAMING state: data frames in any interleaving, then exactly one
/// terminal transition.
pub struct StreamingEncoder {
    tx: mpsc::Sender<StreamFrame>,
    message_id: String,
}

impl StreamingEncoder {
    async fn emit(&self, frame: StreamFrame) -> Result<(), StreamClosed> {
        self.tx.send(frame).await.map_err(|_| StreamClosed)
    }

    /// Emit one token delta.
    pub async fn token_delta(&self, delta: &str) -> Result<(), StreamClosed> {
        self.emit(StreamFrame::Message {
            data: delta.to_string(),
            message_id: self.message_id.clone(),
        })
        .await
    }

    /// Emit the citation set.
    pub async fn sources(&self, documents: &[Document]) -> Result<(), StreamClosed> {
        self.emit(StreamFrame::Sources {
            data: documents.to_vec(),
            message_id: self.message_id.clone(),
        })
        .await
    }

    /// Emit follow-up suggestions.
    pub async fn suggestions(&self, items: &[String]) -> Result<(), StreamClosed> {
        self.emit(StreamFrame::Suggestions {
            data: items.to_vec(),
            message_id: self.message_id.clone(),
        })
        .await
    }

    /// Terminal transition into COMPLETED. Consumes the encoder and closes
    /// the transport.
    pub async fn complete(self) {
        let message_id = self.message_id.clone();
        self.finish(StreamFrame::MessageEnd { message_id }).await;
    }

    /// Terminal transition into ERRORED. Consumes the encoder and closes
    /// the transport.
    pub async fn error(self, message: &str) {
        let frame = StreamFrame::Error {
            data: message.to_string(),
            message_id: self.message_id.clone(),
        };
        self.finish(frame).await;
    }

    /// Best-effort terminal send, bounded by the grace period so a stalled
    /// consumer cannot block the turn's teardown and persistence.
    async fn finish(self, frame: StreamFrame) {
        match tokio::time::timeout(TERMINAL_SEND_GRACE, self.emit(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(StreamClosed)) => debug!("consumer gone before terminal frame"),
            Err(_) => debug!("consumer stalled, terminal frame dropped"),
        }
        // Dropping self drops the sender: transport closed.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_arrive_in_emission_order_then_channel_closes() {
        let (tx, mut rx) = mpsc::channel(8);
        let encoder = ProtocolEncoder::new(tx, "a1").begin();

        encoder.sources(&[]).await.unwrap();
        encoder.token_delta("Hel").await.unwrap();
        encoder.token_delta("lo").await.unwrap();
        encoder.complete().await;

        let mut kinds = Vec::new();
        while let Some(frame) = rx.recv().await {
            kinds.push(frame);
        }
        assert_eq!(kinds.len(), 4);
        assert!(matches!(kinds[0], StreamFrame::Sources { .. }));
        assert!(matches!(kinds[1], StreamFrame::Message { ref data, .. } if data == "Hel"));
        assert!(kinds[3].is_terminal());
        // recv() returned None: the transport is closed after the terminal.
    }

    #[tokio::test]
    async fn error_is_terminal_and_closes_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let encoder = ProtocolEncoder::new(tx, "a1").begin();

        encoder.token_delta("partial").await.unwrap();
        encoder.error("generation failed").await;

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[1], StreamFrame::Error { ref data, .. } if data == "generation failed"));
    }

    #[tokio::test]
    async fn dropped_consumer_reports_stream_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let encoder = ProtocolEncoder::new(tx, "a1").begin();
        assert_eq!(encoder.token_delta("x").await, Err(StreamClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_consumer_does_not_block_terminal_transition() {
        let (tx, _rx) = mpsc::channel(1);
        let encoder = ProtocolEncoder::new(tx, "a1").begin();
        encoder.token_delta("fills the only slot").await.unwrap();

        // The consumer is alive but not reading: the channel is full. The
        // terminal transition must still return once the grace elapses.
        encoder.complete().await;
    }
}
