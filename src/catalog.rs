//! Tool catalogue loaded from `tools.json`
//!
//! The file maps a category name to a list of tools:
//!
//! ```json
//! {
//!   "recon": [
//!     { "id": "nmap", "name": "Nmap", "type": "system", "cmd": "nmap -sV {TARGET}" }
//!   ]
//! }
//! ```

use crate::errors::{Result, StreamError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Placeholder replaced by the caller's target in system commands
pub const TARGET_PLACEHOLDER: &str = "{TARGET}";

/// How a catalogue tool is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Shell command template run under the sandbox
    System,
    /// WebAssembly module, not executed by this server
    Wasm,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Fields the UI uses that the server does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ToolEntry {
    pub fn kind(&self) -> ToolKind {
        match self.kind.as_str() {
            "system" => ToolKind::System,
            "wasm" => ToolKind::Wasm,
            _ => ToolKind::Unknown,
        }
    }

    /// Shell command for this tool with the target substituted
    pub fn render_command(&self, target: &str) -> Result<String> {
        if self.kind() != ToolKind::System {
            return Err(StreamError::Validation(
                "Unsupported tool type".to_string(),
            ));
        }

        match self.cmd.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(cmd) => Ok(cmd.replace(TARGET_PLACEHOLDER, target)),
            None => Err(StreamError::Validation(format!(
                "Tool {} has no command",
                self.id
            ))),
        }
    }
}

/// Tools grouped by category
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ToolCatalog {
    categories: BTreeMap<String, Vec<ToolEntry>>,
}

impl ToolCatalog {
    /// Load the catalogue; a missing file yields an empty catalogue
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Tool catalogue {} not found, /tools and /stream will be empty",
                path.display()
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&text)?;
        info!(
            "Loaded {} tools in {} categories from {}",
            catalog.len(),
            catalog.categories.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| StreamError::Catalog(e.to_string()))
    }

    pub fn find(&self, id: &str) -> Option<&ToolEntry> {
        self.categories.values().flatten().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
