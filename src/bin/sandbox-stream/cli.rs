use clap::Parser;
use sandbox_stream::config::{
    default_shell, SandboxTool, ServerConfig, DEFAULT_BIND, DEFAULT_LEGACY_PROFILE,
    DEFAULT_MAX_LINE_BYTES, DEFAULT_SINK_CAPACITY, DEFAULT_STDERR_PREFIX, DEFAULT_TOOL_PROFILE,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sandbox-stream")]
#[command(version, about = "Stream sandboxed command output over HTTP", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Default: firejail, profiles searched under ./sandbox_profiles
    sandbox-stream

    # Explicit profile directory and exit status frames
    sandbox-stream --profile-dir /etc/sandbox/profiles --report-exit-status

    # Development only: run commands directly on the host
    sandbox-stream --no-sandbox --shell sh --shell -c

    curl -N -X POST http://127.0.0.1:9000/run-system \\
        -d '{\"binary\":\"echo\",\"args\":[\"hello\"],\"target\":\"world\"}'
")]
pub struct Cli {
    /// Listen address
    #[arg(short, long, env = "SANDBOX_BIND", default_value = DEFAULT_BIND)]
    pub bind: String,

    /// Sandbox binary wrapping every command
    #[arg(long, env = "SANDBOX_BIN", default_value = "firejail")]
    pub sandbox_bin: String,

    /// Flag passed to the sandbox before the profile (repeatable)
    #[arg(long = "sandbox-flag", value_name = "FLAG", allow_hyphen_values = true)]
    pub sandbox_flags: Vec<String>,

    /// Prefix joined with the resolved profile path
    #[arg(long, default_value = "--profile=", allow_hyphen_values = true)]
    pub profile_flag: String,

    /// Run commands without the sandbox
    #[arg(long)]
    pub no_sandbox: bool,

    /// Shell invocation for legacy commands (repeatable, command appended)
    #[arg(long = "shell", value_name = "ARG", allow_hyphen_values = true)]
    pub shell: Vec<String>,

    /// Directory holding sandbox profiles
    #[arg(long, env = "SANDBOX_PROFILE_DIR", value_name = "PATH")]
    pub profile_dir: Option<PathBuf>,

    /// Profile for structured requests that do not name one
    #[arg(long, default_value = DEFAULT_TOOL_PROFILE)]
    pub default_profile: String,

    /// Profile for legacy commands and catalogue tools
    #[arg(long, default_value = DEFAULT_LEGACY_PROFILE)]
    pub legacy_profile: String,

    /// Payload prefix for stderr lines
    #[arg(long, default_value = DEFAULT_STDERR_PREFIX)]
    pub stderr_prefix: String,

    /// Send an EXIT frame with the exit status before DONE
    #[arg(long)]
    pub report_exit_status: bool,

    /// Frames buffered per request before output is throttled
    #[arg(long, default_value_t = DEFAULT_SINK_CAPACITY)]
    pub sink_capacity: usize,

    /// Longest line buffered before it is sent in pieces
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_BYTES, value_name = "BYTES")]
    pub max_line_bytes: usize,

    /// Tool catalogue
    #[arg(long, env = "SANDBOX_TOOLS", default_value = "tools.json", value_name = "PATH")]
    pub tools: PathBuf,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn into_config(self) -> ServerConfig {
        let sandbox = if self.no_sandbox {
            None
        } else {
            let defaults = SandboxTool::default();
            Some(SandboxTool {
                program: self.sandbox_bin,
                flags: if self.sandbox_flags.is_empty() {
                    defaults.flags
                } else {
                    self.sandbox_flags
                },
                profile_flag: self.profile_flag,
            })
        };

        ServerConfig {
            bind: self.bind,
            sandbox,
            shell: if self.shell.is_empty() {
                default_shell()
            } else {
                self.shell
            },
            profile_dir: self.profile_dir,
            default_profile: self.default_profile,
            legacy_profile: self.legacy_profile,
            stderr_prefix: self.stderr_prefix,
            report_exit_status: self.report_exit_status,
            sink_capacity: self.sink_capacity,
            max_line_bytes: self.max_line_bytes,
            tools_path: self.tools,
        }
    }
}
