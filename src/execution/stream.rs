//! Output events and pipe draining
//!
//! Framing is line-oriented: every newline-terminated line becomes one
//! `Data` event with the terminator (`\n` or `\r\n`) stripped. Bytes left
//! over when a pipe reaches end-of-stream are emitted as a final event.
//! Invalid UTF-8 is replaced rather than rejected.
//!
//! A line longer than `max_line_bytes` is never held whole: each full piece
//! of that size is sent as its own `Data` event as soon as it is read, so a
//! child writing without newlines still streams in bounded memory. A
//! multi-byte character cut at a piece boundary decodes as replacement
//! characters.

use crate::execution::sink::ResponseSink;
use log::warn;
use std::fmt;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Output pipe an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Stdout,
    Stderr,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stdout => f.write_str("stdout"),
            Channel::Stderr => f.write_str("stderr"),
        }
    }
}

/// One event on a run's output stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Stream opened, sent before the process is launched
    Started,
    /// One line of process output
    Data { channel: Channel, text: String },
    /// Launch or pipe read failure
    Failed { message: String },
    /// Process exit status
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// Terminal event, nothing follows it
    Completed,
}

impl OutputEvent {
    pub fn data(channel: Channel, text: impl Into<String>) -> Self {
        OutputEvent::Data {
            channel,
            text: text.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        OutputEvent::Failed {
            message: message.into(),
        }
    }
}

/// How a drain operation ended
#[derive(Debug)]
pub enum DrainOutcome {
    /// Pipe reached end-of-stream
    Eof { lines: usize },
    /// Pipe read failed, the failure was reported in-stream
    ReadFailed { lines: usize, error: io::Error },
    /// Sink rejected a frame, the client is gone
    SinkClosed { lines: usize },
}

impl DrainOutcome {
    pub fn lines(&self) -> usize {
        match self {
            DrainOutcome::Eof { lines }
            | DrainOutcome::ReadFailed { lines, .. }
            | DrainOutcome::SinkClosed { lines } => *lines,
        }
    }

    pub fn sink_closed(&self) -> bool {
        matches!(self, DrainOutcome::SinkClosed { .. })
    }
}

/// Read `reader` to end-of-stream, forwarding each line to `sink`.
///
/// Sends wait for queue space, so a slow client slows the drain instead of
/// losing lines. At most `max_line_bytes` are buffered per event.
pub async fn drain<R>(
    reader: R,
    channel: Channel,
    max_line_bytes: usize,
    sink: &ResponseSink,
) -> DrainOutcome
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let limit = max_line_bytes.max(1);
    let mut buf = Vec::new();
    let mut lines = 0;
    let mut mid_line = false;

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(limit as u64)
            .read_until(b'\n', &mut buf)
            .await;

        match read {
            Ok(0) => return DrainOutcome::Eof { lines },
            Ok(_) => {
                // A bare terminator right after a full piece ends that piece
                let continues = mid_line;
                mid_line = buf.len() == limit && !buf.ends_with(b"\n");
                if continues && (buf == b"\n" || buf == b"\r\n") {
                    continue;
                }

                let event = OutputEvent::data(channel, decode_line(&buf));
                if sink.send(&event).await.is_err() {
                    return DrainOutcome::SinkClosed { lines };
                }
                lines += 1;
            }
            Err(error) => {
                warn!("{} read failed after {} lines: {}", channel, lines, error);
                if !buf.is_empty() {
                    let event = OutputEvent::data(channel, decode_line(&buf));
                    if sink.send(&event).await.is_err() {
                        return DrainOutcome::SinkClosed { lines };
                    }
                    lines += 1;
                }

                let event = OutputEvent::failed(format!("{} read failed: {}", channel, error));
                if sink.send(&event).await.is_err() {
                    return DrainOutcome::SinkClosed { lines };
                }
                return DrainOutcome::ReadFailed { lines, error };
            }
        }
    }
}

/// Strip one trailing `\n` or `\r\n` and decode lossily
pub fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
