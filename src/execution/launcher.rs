//! Process launching with piped output streams

use crate::errors::{Result, StreamError};
use crate::execution::spec::ExecutionSpec;
use log::debug;
use std::io;
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// A started child with both output pipes still attached
#[derive(Debug)]
pub struct RunningProcess {
    child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

impl RunningProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Hand the process to the completion tracker and the pipes to the drains
    pub fn into_parts(self) -> (Child, ChildStdout, ChildStderr) {
        (self.child, self.stdout, self.stderr)
    }
}

/// Start `spec` with stdin closed and stdout/stderr piped.
///
/// The child leads its own process group and is killed if its handle is
/// dropped before being reaped.
pub fn launch(spec: &ExecutionSpec) -> Result<RunningProcess> {
    let mut command = Command::new(spec.program());
    command
        .args(spec.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so an abandoned run can be killed with its descendants
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| StreamError::Launch {
        program: spec.program().to_string(),
        source,
    })?;

    let stdout = child.stdout.take().ok_or_else(|| missing_pipe(spec, "stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe(spec, "stderr"))?;

    debug!("Launched pid {:?}: {}", child.id(), spec);

    Ok(RunningProcess {
        child,
        stdout,
        stderr,
    })
}

fn missing_pipe(spec: &ExecutionSpec, name: &str) -> StreamError {
    StreamError::Launch {
        program: spec.program().to_string(),
        source: io::Error::other(format!("{} pipe unavailable", name)),
    }
}
