//! Claude CLI backend: one `claude --print --output-format stream-json`
//! process per run, decoded line by line.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use skillgate_core::{AgentError, UpstreamMessage};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

use crate::{AgentClient, AgentStream, QueryOptions};

/// Characters of stderr kept in a process failure.
const STDERR_TAIL: usize = 2000;

/// Runs the agent through the Claude CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCliClient {
    program: PathBuf,
    api_key: Option<String>,
}

impl ClaudeCliClient {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            api_key: None,
        }
    }

    /// Exports `ANTHROPIC_API_KEY` to the child process.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    /// Command-line arguments for one run.
    pub fn command_args(prompt: &str, options: &QueryOptions) -> Vec<String> {
        let mut args: Vec<String> = ["--print", "--output-format", "stream-json", "--verbose"]
            .into_iter()
            .map(String::from)
            .collect();

        args.push("--permission-mode".into());
        args.push(options.permission_mode.as_str().into());

        if !options.setting_sources.is_empty() {
            let sources: Vec<&str> = options.setting_sources.iter().map(|s| s.as_str()).collect();
            args.push("--setting-sources".into());
            args.push(sources.join(","));
        }
        if let Some(model) = &options.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        if let Some(max_turns) = options.max_turns {
            args.push("--max-turns".into());
            args.push(max_turns.to_string());
        }
        if let Some(system_prompt) = &options.system_prompt {
            args.push("--append-system-prompt".into());
            args.push(system_prompt.clone());
        }
        if let Some(tools) = &options.allowed_tools {
            args.push("--allowedTools".into());
            args.push(tools.join(","));
        }

        args.push("--".into());
        args.push(prompt.to_string());
        args
    }
}

#[async_trait]
impl AgentClient for ClaudeCliClient {
    async fn query(&self, prompt: &str, options: &QueryOptions) -> Result<AgentStream, AgentError> {
        let mut command = Command::new(&self.program);
        command
            .args(Self::command_args(prompt, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &options.cwd {
            command.current_dir(cwd);
        }
        if let Some(api_key) = &self.api_key {
            command.env("ANTHROPIC_API_KEY", api_key);
        }

        let mut child = command
            .spawn()
            .map_err(|e| AgentError::Spawn(format!("{}: {}", self.program.display(), e)))?;
        info!("Started {} (pid {:?})", self.program.display(), child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Spawn("agent stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::Spawn("agent stderr not captured".into()))?;

        Ok(Box::pin(process_messages(child, stdout, stderr)))
    }
}

/// Decodes newline-delimited JSON messages; blank lines are skipped.
fn decode_lines<R>(reader: R) -> impl Stream<Item = Result<UpstreamMessage, AgentError>> + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    try_stream! {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AgentError::Request(format!("reading agent output: {}", e)))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let message = UpstreamMessage::from_json_line(&line)?;
            debug!("Agent message: {}", message.message_type());
            yield message;
        }
    }
}

/// Relays stdout messages, then reaps the process.
///
/// A non-zero exit is only an error when no `result` message was seen. The
/// child is killed if the stream is dropped early.
fn process_messages<R>(
    mut child: Child,
    stdout: R,
    stderr: ChildStderr,
) -> impl Stream<Item = Result<UpstreamMessage, AgentError>> + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    try_stream! {
        let stderr_task = tokio::spawn(read_stderr(stderr));

        let mut messages = Box::pin(decode_lines(stdout));
        let mut saw_result = false;
        while let Some(message) = messages.next().await {
            let message = message?;
            saw_result |= message.as_result().is_some();
            yield message;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AgentError::Request(format!("waiting for agent process: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            warn!("Agent process exited with {} (result seen: {})", status, saw_result);
            if !saw_result {
                Err::<(), _>(AgentError::ProcessFailed {
                    status: status.to_string(),
                    stderr: tail(&stderr, STDERR_TAIL),
                })?;
            }
        }
    }
}

async fn read_stderr(mut stderr: ChildStderr) -> String {
    let mut buf = String::new();
    if let Err(e) = stderr.read_to_string(&mut buf).await {
        debug!("Failed to read agent stderr: {}", e);
    }
    buf
}

fn tail(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}
