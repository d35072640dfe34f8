//! Execution layer: process launch and output streaming
//!
//! This module turns a validated request into a running child process and
//! streams its output to one HTTP response.
//!
//! # Components
//!
//! - **spec**: program + argv, including sandbox flags
//! - **launcher**: spawn with both output pipes attached
//! - **stream**: output events and the per-pipe drain
//! - **sink**: SSE encoding and the bounded frame queue
//! - **tracker**: drives a run and emits the terminal event last
//!
//! # Examples
//!
//! ```ignore
//! use sandbox_stream::execution::{CompletionTracker, EventEncoder, ExecutionSpec, ResponseSink};
//!
//! let spec = ExecutionSpec::new("echo", vec!["hello".into()])?;
//! let (sink, receiver) = ResponseSink::channel(64, EventEncoder::default());
//! let summary = CompletionTracker::default().run(spec, sink).await;
//! ```

pub mod launcher;
pub mod sink;
pub mod spec;
pub mod stream;
pub mod tracker;

pub use launcher::{launch, RunningProcess};
pub use sink::{EventEncoder, ResponseSink, SinkReceiver};
pub use spec::{ExecutionSpec, SpecBuilder};
pub use stream::{Channel, DrainOutcome, OutputEvent};
pub use tracker::{CompletionTracker, RunSummary};
