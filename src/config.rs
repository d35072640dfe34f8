//! Server configuration
//!
//! `ServerConfig` is assembled once at startup (see the `sandbox-stream`
//! binary for the command-line surface) and shared read-only by every request.

use crate::errors::{Result, StreamError};
use std::path::{Path, PathBuf};

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:9000";
/// Profile used by legacy `{cmd}` requests and catalogue tools
pub const DEFAULT_LEGACY_PROFILE: &str = "system.profile";
/// Profile used by structured requests that do not name one
pub const DEFAULT_TOOL_PROFILE: &str = "default.profile";
/// Payload prefix applied to stderr lines on the wire
pub const DEFAULT_STDERR_PREFIX: &str = "ERR: ";
/// Frames buffered per request before the drains feel back-pressure
pub const DEFAULT_SINK_CAPACITY: usize = 64;
/// Longest line held in memory; longer output is sent in pieces of this size
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// External process-isolation utility that wraps every launched program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxTool {
    /// Sandbox binary (e.g. `firejail`)
    pub program: String,
    /// Flags placed before the profile flag
    pub flags: Vec<String>,
    /// Prefix joined with the resolved profile path
    pub profile_flag: String,
}

impl Default for SandboxTool {
    fn default() -> Self {
        Self {
            program: "firejail".to_string(),
            flags: vec!["--quiet".to_string()],
            profile_flag: "--profile=".to_string(),
        }
    }
}

impl SandboxTool {
    /// Render the profile argument for a resolved profile path
    pub fn profile_arg(&self, profile: &Path) -> String {
        format!("{}{}", self.profile_flag, profile.display())
    }
}

/// Runtime configuration for the streaming server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Sandbox wrapper; `None` launches programs directly
    pub sandbox: Option<SandboxTool>,
    /// Shell invocation used for legacy commands, the command string is appended
    pub shell: Vec<String>,
    /// Explicit profile directory, bypasses the search heuristics
    pub profile_dir: Option<PathBuf>,
    /// Profile for structured requests without one
    pub default_profile: String,
    /// Profile for legacy commands
    pub legacy_profile: String,
    /// Prefix for stderr payloads on the wire
    pub stderr_prefix: String,
    /// Emit an `EXIT:` frame before `DONE`
    pub report_exit_status: bool,
    /// Bounded frame queue between drains and the HTTP body
    pub sink_capacity: usize,
    /// Bytes read from a pipe before an unterminated line is flushed as a frame
    pub max_line_bytes: usize,
    /// Path of the tool catalogue
    pub tools_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            sandbox: Some(SandboxTool::default()),
            shell: default_shell(),
            profile_dir: None,
            default_profile: DEFAULT_TOOL_PROFILE.to_string(),
            legacy_profile: DEFAULT_LEGACY_PROFILE.to_string(),
            stderr_prefix: DEFAULT_STDERR_PREFIX.to_string(),
            report_exit_status: false,
            sink_capacity: DEFAULT_SINK_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            tools_path: PathBuf::from("tools.json"),
        }
    }
}

/// Line-buffered bash, so output reaches the pipes as it is produced
pub fn default_shell() -> Vec<String> {
    ["stdbuf", "-oL", "-eL", "bash", "-c"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ServerConfig {
    /// Configuration that runs programs directly under `sh -c`, without a sandbox
    pub fn unsandboxed() -> Self {
        Self {
            sandbox: None,
            shell: vec!["sh".to_string(), "-c".to_string()],
            ..Self::default()
        }
    }

    /// Reject configurations that could never launch anything
    pub fn validate(&self) -> Result<()> {
        if self.shell.first().map_or(true, |s| s.is_empty()) {
            return Err(StreamError::Config("shell invocation is empty".to_string()));
        }

        if let Some(sandbox) = &self.sandbox {
            if sandbox.program.is_empty() {
                return Err(StreamError::Config(
                    "sandbox program is empty".to_string(),
                ));
            }
        }

        if self.sink_capacity == 0 {
            return Err(StreamError::Config(
                "sink capacity must be at least 1".to_string(),
            ));
        }

        if self.max_line_bytes == 0 {
            return Err(StreamError::Config(
                "max line length must be at least 1 byte".to_string(),
            ));
        }

        if self.bind.is_empty() {
            return Err(StreamError::Config("bind address is empty".to_string()));
        }

        Ok(())
    }
}
