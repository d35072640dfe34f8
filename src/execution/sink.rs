//! Response sink and wire encoding
//!
//! Each `OutputEvent` becomes one server-sent-events record:
//!
//! ```text
//! data: start
//!
//! data: hello world
//!
//! data: ERR: warning on stderr
//!
//! data: DONE
//!
//! ```
//!
//! Drains never touch the HTTP connection. They push encoded frames into a
//! bounded queue whose receiving end is the response body, so the body is
//! the only writer and every frame is handed to the connection on its own.

use crate::execution::stream::{Channel, OutputEvent};
use crate::errors::{Result, StreamError};
use actix_web::web::Bytes;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use tokio::sync::mpsc;

/// Payload of the first frame
pub const START_MARKER: &str = "start";
/// Payload of the terminal frame
pub const DONE_MARKER: &str = "DONE";

/// Formats events as SSE frames
#[derive(Debug, Clone)]
pub struct EventEncoder {
    stderr_prefix: String,
}

impl Default for EventEncoder {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_STDERR_PREFIX)
    }
}

impl EventEncoder {
    pub fn new(stderr_prefix: impl Into<String>) -> Self {
        Self {
            stderr_prefix: stderr_prefix.into(),
        }
    }

    pub fn payload(&self, event: &OutputEvent) -> String {
        match event {
            OutputEvent::Started => START_MARKER.to_string(),
            OutputEvent::Data {
                channel: Channel::Stdout,
                text,
            } => text.clone(),
            OutputEvent::Data {
                channel: Channel::Stderr,
                text,
            } => format!("{}{}", self.stderr_prefix, text),
            OutputEvent::Failed { message } => message.clone(),
            OutputEvent::Exited { code: Some(code), .. } => format!("EXIT: {}", code),
            OutputEvent::Exited {
                signal: Some(signal),
                ..
            } => format!("EXIT: signal {}", signal),
            OutputEvent::Exited { .. } => "EXIT: unknown".to_string(),
            OutputEvent::Completed => DONE_MARKER.to_string(),
        }
    }

    /// Encode one event as a self-delimited frame.
    ///
    /// A carriage return inside the payload would end the SSE line early, so
    /// the payload is split into several `data:` lines of the same record.
    pub fn encode(&self, event: &OutputEvent) -> Bytes {
        let payload = self.payload(event);
        let mut frame = String::with_capacity(payload.len() + 8);
        for part in payload.split('\r') {
            frame.push_str("data: ");
            frame.push_str(part);
            frame.push('\n');
        }
        frame.push('\n');
        Bytes::from(frame)
    }
}

/// Write side of one response stream
#[derive(Debug, Clone)]
pub struct ResponseSink {
    tx: mpsc::Sender<Bytes>,
    encoder: EventEncoder,
}

/// Read side, owned by the HTTP response body
#[derive(Debug)]
pub struct SinkReceiver {
    rx: mpsc::Receiver<Bytes>,
}

impl ResponseSink {
    /// Bounded sink holding at most `capacity` undelivered frames
    pub fn channel(capacity: usize, encoder: EventEncoder) -> (ResponseSink, SinkReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ResponseSink { tx, encoder }, SinkReceiver { rx })
    }

    /// Queue one event, waiting while the queue is full
    pub async fn send(&self, event: &OutputEvent) -> Result<()> {
        self.tx
            .send(self.encoder.encode(event))
            .await
            .map_err(|_| StreamError::SinkClosed)
    }

    /// Resolves once the response body has been dropped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl SinkReceiver {
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Body stream for `HttpResponseBuilder::streaming`
    pub fn into_stream(self) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> {
        stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|frame| (Ok(frame), rx))
        })
    }
}
