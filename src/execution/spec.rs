//! Execution spec building
//!
//! Pure transformation from a validated request into the program and argv
//! that the launcher starts. No I/O happens here; profile paths arrive
//! already resolved.

use crate::config::{SandboxTool, ServerConfig};
use crate::errors::{Result, StreamError};
use crate::request::ToolRequest;
use std::fmt;
use std::path::Path;

/// Resolved program and argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSpec {
    program: String,
    args: Vec<String>,
}

impl ExecutionSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Result<Self> {
        let program = program.into();
        if program.is_empty() {
            return Err(StreamError::Validation(
                "Command cannot be empty".to_string(),
            ));
        }
        Ok(Self { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ExecutionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Builds execution specs around the configured sandbox tool
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    sandbox: Option<SandboxTool>,
    shell: Vec<String>,
}

impl SpecBuilder {
    pub fn new(sandbox: Option<SandboxTool>, shell: Vec<String>) -> Self {
        Self { sandbox, shell }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.sandbox.clone(), config.shell.clone())
    }

    /// `<sandbox flags> <binary> <args...> <target>`
    pub fn tool(&self, req: &ToolRequest, profile: &Path) -> Result<ExecutionSpec> {
        if req.binary.is_empty() {
            return Err(StreamError::Validation(
                "Command cannot be empty".to_string(),
            ));
        }

        let mut inner = Vec::with_capacity(req.args.len() + 2);
        inner.push(req.binary.clone());
        inner.extend(req.args.iter().cloned());
        if let Some(target) = &req.target {
            inner.push(target.clone());
        }

        self.wrap(inner, profile)
    }

    /// `<sandbox flags> <shell...> <cmd>`
    pub fn legacy(&self, cmd: &str, profile: &Path) -> Result<ExecutionSpec> {
        if cmd.trim().is_empty() {
            return Err(StreamError::Validation(
                "Command cannot be empty".to_string(),
            ));
        }

        let mut inner = self.shell.clone();
        inner.push(cmd.to_string());
        self.wrap(inner, profile)
    }

    fn wrap(&self, mut inner: Vec<String>, profile: &Path) -> Result<ExecutionSpec> {
        match &self.sandbox {
            Some(sandbox) => {
                let mut args = sandbox.flags.clone();
                args.push(sandbox.profile_arg(profile));
                args.append(&mut inner);
                ExecutionSpec::new(sandbox.program.clone(), args)
            }
            None => {
                if inner.is_empty() {
                    return Err(StreamError::Config("shell invocation is empty".to_string()));
                }
                let program = inner.remove(0);
                ExecutionSpec::new(program, inner)
            }
        }
    }
}
