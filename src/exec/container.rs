use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{CommandOutput, CommandRunner, StreamChunk};
use crate::{Error, Result};

/// Read size for streamed stdout. Files are never buffered whole.
const CHUNK_SIZE: usize = 64 * 1024;

/// What the runtime CLI runs commands against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A fresh throwaway container per command (`run --rm --entrypoint`).
    Image(String),
    /// An already running container (`exec`).
    Container(String),
}

/// Runs commands through `docker`/`podman`.
pub struct ContainerRunner {
    cmd: String,
    target: Target,
    user: Option<String>,
}

impl ContainerRunner {
    pub fn new(cmd: impl Into<String>, target: Target) -> Self {
        Self {
            cmd: cmd.into(),
            target,
            user: None,
        }
    }

    /// Run commands as `user` instead of the image's default user.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    /// The full argument list handed to the runtime CLI.
    pub fn cli_args(&self, command: &str, args: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(args.len() + 8);
        match &self.target {
            Target::Image(image) => {
                out.extend(
                    ["run", "--rm", "--network", "none", "--entrypoint", command]
                        .map(String::from),
                );
                if let Some(user) = &self.user {
                    out.push("--user".into());
                    out.push(user.clone());
                }
                out.push(image.clone());
            }
            Target::Container(id) => {
                out.push("exec".into());
                if let Some(user) = &self.user {
                    out.push("--user".into());
                    out.push(user.clone());
                }
                out.push(id.clone());
                out.push(command.to_string());
            }
        }
        out.extend(args.iter().cloned());
        out
    }

    fn spawn_error(&self, source: std::io::Error) -> Error {
        Error::Spawn {
            command: self.cmd.clone(),
            source,
        }
    }
}

fn describe(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} {}", args.join(" "))
    }
}

#[async_trait]
impl CommandRunner for ContainerRunner {
    async fn run(&self, command: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(runtime = %self.cmd, command = %describe(command, args), "Running command");

        let output = Command::new(&self.cmd)
            .args(self.cli_args(command, args))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: describe(command, args),
                exit_code: output.status.code().unwrap_or(-1),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }

    async fn stream(
        &self,
        command: &str,
        args: &[String],
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<()> {
        debug!(runtime = %self.cmd, command = %describe(command, args), "Streaming command");

        let mut child = Command::new(&self.cmd)
            .args(self.cli_args(command, args))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("stdout was not captured")))?;

        // Drain stderr alongside stdout so a chatty command can't fill the pipe
        // and stall.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut s = String::new();
                let _ = stderr.read_to_string(&mut s).await;
                s
            })
        });

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0usize;
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    on_chunk(StreamChunk::Data(buf[..n].to_vec()));
                }
                Err(e) => {
                    on_chunk(StreamChunk::Error(e.to_string()));
                    break;
                }
            }
        }
        drop(stdout);

        let code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                on_chunk(StreamChunk::Error(e.to_string()));
                -1
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        if code != 0 && !stderr.trim().is_empty() {
            on_chunk(StreamChunk::Error(stderr.trim().to_string()));
        }

        trace!(bytes = total, exit_code = code, "Stream finished");
        on_chunk(StreamChunk::Exit(code));
        Ok(())
    }
}
