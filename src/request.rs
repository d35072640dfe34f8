//! Inbound run requests
//!
//! Two body shapes are accepted on `/run-system`:
//!
//! - structured: `{"tool", "binary", "args", "target", "profile"}`
//! - legacy: `{"cmd"}`, a whole shell command
//!
//! The body is parsed exactly once. A non-empty `binary` selects the
//! structured shape; anything else must carry a non-empty `cmd`.

use crate::errors::{Result, StreamError};
use serde::Deserialize;

/// Structured tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    /// Catalogue id of the tool, informational only
    pub tool: Option<String>,
    /// Program to run inside the sandbox
    pub binary: String,
    /// Arguments placed before the target
    pub args: Vec<String>,
    /// Final argument, omitted when absent
    pub target: Option<String>,
    /// Sandbox profile name
    pub profile: Option<String>,
}

/// Raw shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRequest {
    pub cmd: String,
}

/// A validated run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    Tool(ToolRequest),
    Legacy(LegacyRequest),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRunRequest {
    tool: Option<String>,
    binary: Option<String>,
    args: Option<Vec<String>>,
    target: Option<String>,
    profile: Option<String>,
    cmd: Option<String>,
}

impl RunRequest {
    /// Decode and validate a JSON request body
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let raw: RawRunRequest = serde_json::from_slice(body)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawRunRequest) -> Result<Self> {
        match raw.binary.filter(|b| !b.trim().is_empty()) {
            Some(binary) => {
                let profile = raw.profile.filter(|p| !p.is_empty());
                if let Some(name) = &profile {
                    validate_profile_name(name)?;
                }

                Ok(RunRequest::Tool(ToolRequest {
                    tool: raw.tool.filter(|t| !t.is_empty()),
                    binary,
                    args: raw.args.unwrap_or_default(),
                    target: raw.target.filter(|t| !t.is_empty()),
                    profile,
                }))
            }
            None => match raw.cmd.filter(|c| !c.trim().is_empty()) {
                Some(cmd) => Ok(RunRequest::Legacy(LegacyRequest { cmd })),
                None => Err(StreamError::Validation(
                    "Command cannot be empty".to_string(),
                )),
            },
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            RunRequest::Tool(_) => "tool",
            RunRequest::Legacy(_) => "legacy",
        }
    }
}

/// Profile names are plain file names inside a profile directory
pub fn validate_profile_name(name: &str) -> Result<()> {
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(StreamError::Validation(format!(
            "Invalid profile name: {}",
            name
        )));
    }
    Ok(())
}
