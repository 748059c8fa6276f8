//! Shell tool: allow-listed command execution
//!
//! ```text
//! validate ──▶ authorize ──▶ run ──▶ collect output
//!                 │            │
//!                 │            └─ timeout: kill process group, report TIMEOUT
//!                 └─ deny patterns first, then the allow-list per segment
//! ```
//!
//! Authorization splits the command line on `;`, `|`, `&` and newlines
//! (outside quotes) and checks the leading token of every segment, with any
//! path prefix stripped, so `/usr/bin/ls` and `ls` are the same command.

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use suna_domain::{
    OperationSchema, ParamSpec, TagSpec, Tool, ToolContext, ToolError, ToolLifecycleError,
    ToolResult,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::file::Sandbox;

pub const EXECUTE: &str = "execute";

/// Substrings refused anywhere in a command, case-insensitively.
const DENY_PATTERNS: &[&str] = &[
    r"rm\s+-rf",
    r"rm\s+-fr",
    r">\s*/dev/null",
    r"sudo",
    r"su\s",
    r"passwd",
    r"chmod\s+777",
    r"mkfs",
    r"dd\s+if=",
    r":\(\)\s*\{.*\}",
    r"eval",
    r"exec",
    r"system",
    r"\$\(",
    r"`",
];

/// Time given to output readers after the process is gone
const READER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellToolConfig {
    pub allowed_commands: Vec<String>,
    pub default_timeout_secs: u64,
    /// Ceiling applied to every caller-supplied timeout
    pub max_timeout_secs: u64,
    pub max_command_length: usize,
    /// Per stream
    pub max_output_bytes: usize,
    /// When set, `working_directory` must resolve inside it
    pub sandbox_root: Option<PathBuf>,
}

impl Default for ShellToolConfig {
    fn default() -> Self {
        Self {
            allowed_commands: [
                "ls", "pwd", "echo", "cat", "head", "tail", "grep", "find", "wc", "date",
                "whoami", "uname", "df", "du", "ps", "top", "free", "curl", "wget", "ping",
                "nslookup", "dig", "git", "npm", "node", "python", "python3", "pip", "pip3",
                "docker", "kubectl", "helm",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            default_timeout_secs: 30,
            max_timeout_secs: 60,
            max_command_length: 1000,
            max_output_bytes: 1024 * 1024,
            sandbox_root: None,
        }
    }
}

#[derive(Deserialize)]
struct ExecuteArgs {
    command: String,
    timeout: i64,
    working_directory: Option<String>,
}

/// Captured stream, possibly cut at the output cap.
#[derive(Default)]
struct Captured {
    text: String,
    truncated: bool,
}

pub struct ShellTool {
    config: ShellToolConfig,
    /// Compiled by `init`
    deny: Option<Vec<Regex>>,
    sandbox: Option<Sandbox>,
}

impl ShellTool {
    pub fn new(config: ShellToolConfig) -> Self {
        Self {
            config,
            deny: None,
            sandbox: None,
        }
    }

    /// Policy check only; runs nothing.
    pub fn authorize(&self, command: &str) -> Result<(), ToolError> {
        let deny = self
            .deny
            .as_ref()
            .ok_or_else(|| ToolError::internal("shell tool used before init"))?;

        if command.trim().is_empty() {
            return Err(ToolError::invalid_argument("Command must not be empty"));
        }
        if command.chars().count() > self.config.max_command_length {
            return Err(ToolError::invalid_argument(format!(
                "Command is too long (max {} characters)",
                self.config.max_command_length
            )));
        }

        if let Some(pattern) = deny.iter().find(|p| p.is_match(command)) {
            return Err(ToolError::permission_denied(format!(
                "Command contains potentially dangerous pattern: {}",
                pattern.as_str()
            )));
        }

        for segment in split_segments(command)? {
            let tokens = shlex::split(&segment)
                .ok_or_else(|| ToolError::invalid_argument("Command has unbalanced quotes"))?;
            let Some(first) = tokens.first() else {
                continue;
            };
            let base = first.rsplit('/').next().unwrap_or(first);
            if !self.config.allowed_commands.iter().any(|c| c == base) {
                return Err(ToolError::permission_denied(format!(
                    "Command '{base}' is not in the allowed commands list"
                )));
            }
        }
        Ok(())
    }

    async fn working_directory(&self, requested: Option<&str>) -> Result<Option<PathBuf>, ToolError> {
        let Some(requested) = requested else {
            return Ok(self.sandbox.as_ref().map(|s| s.root().to_path_buf()));
        };
        let path = match &self.sandbox {
            Some(sandbox) => sandbox.resolve_lexical(requested)?,
            None => PathBuf::from(requested),
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(path)),
            Ok(_) => Err(ToolError::invalid_argument(format!(
                "'{requested}' is not a directory"
            ))),
            Err(_) => Err(ToolError::not_found(format!(
                "Working directory does not exist: {requested}"
            ))),
        }
    }

    async fn run(&self, args: ExecuteArgs, context: Option<&ToolContext>) -> Result<Value, ToolError> {
        self.authorize(&args.command)?;
        let cwd = self.working_directory(args.working_directory.as_deref()).await?;
        let timeout_secs = args.timeout.clamp(1, self.config.max_timeout_secs.max(1) as i64) as u64;

        debug!(
            command_len = args.command.len(),
            timeout_secs,
            user_id = ?context.map(|c| c.user_id.as_str()),
            thread_id = ?context.map(|c| c.thread_id.as_str()),
            "Executing shell command"
        );

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&args.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .kill_on_drop(true);
        for key in ["PATH", "HOME", "USER"] {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        if let Some(dir) = &cwd {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::execution_failed(format!("Command execution failed: {e}")))?;

        let limit = self.config.max_output_bytes;
        let stdout = child.stdout.take().map(|s| spawn_reader(s, limit));
        let stderr = child.stderr.take().map(|s| spawn_reader(s, limit));

        let waited = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ToolError::execution_failed(format!(
                    "Command execution failed: {e}"
                )));
            }
            Err(_) => {
                kill_process_group(&mut child).await;
                let (out, err) = (collect(stdout).await, collect(stderr).await);
                warn!(timeout_secs, "Shell command timed out");
                return Err(ToolError::timeout(format!(
                    "Command timed out after {timeout_secs} seconds"
                ))
                .with_details(json!({
                    "command": args.command,
                    "timeout": timeout_secs,
                    "stdout": out.text,
                    "stderr": err.text,
                    "exit_code": -1,
                })));
            }
        };

        let (out, err) = (collect(stdout).await, collect(stderr).await);
        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);

        if !status.success() {
            info!(exit_code, duration_ms, "Shell command failed");
            return Err(ToolError::execution_failed(format!(
                "Command failed with exit code {exit_code}"
            ))
            .with_details(json!({
                "command": args.command,
                "stdout": out.text,
                "stderr": err.text,
                "exit_code": exit_code,
            })));
        }

        info!(
            duration_ms,
            stdout_len = out.text.len(),
            stderr_len = err.text.len(),
            "Shell command executed"
        );
        Ok(json!({
            "stdout": out.text,
            "stderr": err.text,
            "exit_code": exit_code,
            "command": args.command,
            "duration_ms": duration_ms,
            "truncated": out.truncated || err.truncated,
            "working_directory": cwd.as_deref().map(Path::to_string_lossy),
        }))
    }
}

/// Split on unquoted `;`, `|`, `&` and newlines.
fn split_segments(command: &str) -> Result<Vec<String>, ToolError> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in command.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Some('\''), '\'') => {
                quote = None;
                current.push(ch);
            }
            (Some('\''), _) => current.push(ch),
            (_, '\\') => {
                escaped = true;
                current.push(ch);
            }
            (Some('"'), '"') => {
                quote = None;
                current.push(ch);
            }
            (Some(_), _) => current.push(ch),
            (None, '\'' | '"') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, ';' | '|' | '&' | '\n') => {
                segments.push(std::mem::take(&mut current));
            }
            (None, _) => current.push(ch),
        }
    }
    if quote.is_some() {
        return Err(ToolError::invalid_argument("Command has unbalanced quotes"));
    }
    segments.push(current);
    Ok(segments
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect())
}

fn spawn_reader<R>(mut stream: R, limit: usize) -> JoinHandle<Captured>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut kept = Vec::new();
        let mut truncated = false;
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    if n > room {
                        truncated = true;
                    }
                    kept.extend_from_slice(&buf[..n.min(room)]);
                }
            }
        }
        Captured {
            text: String::from_utf8_lossy(&kept).into_owned(),
            truncated,
        }
    })
}

async fn collect(handle: Option<JoinHandle<Captured>>) -> Captured {
    let Some(handle) = handle else {
        return Captured::default();
    };
    let abort = handle.abort_handle();
    match tokio::time::timeout(READER_GRACE, handle).await {
        Ok(Ok(captured)) => captured,
        Ok(Err(_)) => Captured::default(),
        Err(_) => {
            abort.abort();
            Captured::default()
        }
    }
}

async fn kill_process_group(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // The child leads its own group (process_group(0)); take the whole tree down.
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Child already gone after group kill");
    }
}

fn operation_schemas(config: &ShellToolConfig) -> Vec<OperationSchema> {
    vec![
        OperationSchema::new(EXECUTE, "Execute a shell command and return the output")
            .param(ParamSpec::string("command", "The shell command to execute").required())
            .param(
                ParamSpec::integer(
                    "timeout",
                    format!(
                        "Timeout in seconds (default: {}, max: {})",
                        config.default_timeout_secs, config.max_timeout_secs
                    ),
                )
                .with_default(config.default_timeout_secs),
            )
            .param(ParamSpec::string(
                "working_directory",
                "Working directory for command execution",
            ))
            .example(json!({"command": "ls -la"}))
            .example(json!({"command": "pwd"}))
            .example(json!({"command": "echo \"Hello World\"", "timeout": 10}))
            .with_tag(TagSpec::new("shell_execute").with_description("Execute a shell command")),
    ]
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute shell commands in a sandboxed environment"
    }

    async fn init(&mut self) -> Result<(), ToolLifecycleError> {
        let deny = DENY_PATTERNS
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ToolLifecycleError::Other(format!("invalid deny pattern: {e}")))?;

        if let Some(root) = &self.config.sandbox_root {
            let canonical = tokio::fs::canonicalize(root)
                .await
                .map_err(|source| ToolLifecycleError::Io {
                    path: root.display().to_string(),
                    source,
                })?;
            self.sandbox = Some(Sandbox::new(canonical));
        }

        info!(
            allowed_commands = self.config.allowed_commands.len(),
            deny_patterns = deny.len(),
            "Shell tool initialized"
        );
        self.deny = Some(deny);
        Ok(())
    }

    fn schemas(&self) -> Vec<OperationSchema> {
        operation_schemas(&self.config)
    }

    async fn execute(
        &self,
        operation: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult {
        if operation != EXECUTE {
            return ToolResult::unknown_operation(self.name(), operation);
        }
        let schemas = operation_schemas(&self.config);
        let args = match schemas[0].parse::<ExecuteArgs>(params) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };
        match self.run(args, context).await {
            Ok(data) => ToolResult::success(data)
                .with_metadata("executed_at", chrono::Utc::now().to_rfc3339()),
            Err(e) => ToolResult::failure(e),
        }
    }

    async fn cleanup(&self) -> Result<(), ToolLifecycleError> {
        info!("Shell tool cleaned up");
        Ok(())
    }
}
