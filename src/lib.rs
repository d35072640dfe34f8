//! sandbox-stream: sandboxed command execution streamed over HTTP
//!
//! Accepts a tool invocation or a raw shell command, runs it under an
//! external sandboxing tool (firejail by default) and streams the combined
//! stdout/stderr back to the caller as server-sent events while the process
//! runs. The stream always ends with `data: DONE`.
//!
//! # Modules
//!
//! - **execution**: Spec building, launch, pipe draining and completion tracking
//! - **request**: Inbound request decoding
//! - **profile**: Sandbox profile resolution
//! - **catalog**: Tool catalogue (`tools.json`)
//! - **config**: Server configuration
//! - **server**: HTTP routes and the server object
//!
//! # Example
//!
//! ```ignore
//! use sandbox_stream::{ServerConfig, StreamServer};
//!
//! let server = StreamServer::new(ServerConfig::default())?;
//! server.run().await?;
//! ```

// Core modules
pub mod config;
pub mod errors;

// Layered modules
pub mod catalog;
pub mod execution;
pub mod profile;
pub mod request;

// HTTP surface
pub mod server;

// Public API
pub use catalog::{ToolCatalog, ToolEntry, ToolKind};
pub use config::{SandboxTool, ServerConfig};
pub use errors::{Result, StreamError};
pub use execution::{
    Channel, CompletionTracker, EventEncoder, ExecutionSpec, OutputEvent, ResponseSink,
    RunSummary, SpecBuilder,
};
pub use profile::ProfileResolver;
pub use request::{LegacyRequest, RunRequest, ToolRequest};
pub use server::{AppState, StreamServer};
