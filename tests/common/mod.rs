#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rummage::exec::{CommandOutput, CommandRunner, StreamChunk};
use rummage::{Error, Result};

enum Response {
    Ok(String),
    Fail {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

/// Canned command output keyed by the full command line (`ls -lanR /usr`).
///
/// Unknown commands fail the way a missing path does.
#[derive(Default)]
pub struct MockRunner {
    responses: Mutex<HashMap<String, Response>>,
    streams: Mutex<HashMap<String, Vec<StreamChunk>>>,
    calls: Mutex<Vec<String>>,
    unstartable: bool,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner whose commands can never be started.
    pub fn unstartable() -> Self {
        Self {
            unstartable: true,
            ..Self::default()
        }
    }

    pub fn on(self, command_line: &str, stdout: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(command_line.to_string(), Response::Ok(stdout.to_string()));
        self
    }

    pub fn fail(self, command_line: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.lock().unwrap().insert(
            command_line.to_string(),
            Response::Fail {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn stream_chunks(self, command_line: &str, chunks: Vec<StreamChunk>) -> Self {
        self.streams
            .lock()
            .unwrap()
            .insert(command_line.to_string(), chunks);
        self
    }

    /// Every command line run or streamed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn_error(command: &str) -> Error {
    Error::Spawn {
        command: command.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "runtime not installed"),
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, command: &str, args: &[String]) -> Result<CommandOutput> {
        let line = command_line(command, args);
        self.calls.lock().unwrap().push(line.clone());
        if self.unstartable {
            return Err(spawn_error(command));
        }

        match self.responses.lock().unwrap().get(&line) {
            Some(Response::Ok(stdout)) => Ok(CommandOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            }),
            Some(Response::Fail {
                exit_code,
                stdout,
                stderr,
            }) => Err(Error::CommandFailed {
                command: line.clone(),
                exit_code: *exit_code,
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            }),
            None => Err(Error::CommandFailed {
                stderr: format!("{command}: {}: No such file or directory", args.join(" ")),
                command: line,
                exit_code: 2,
                stdout: String::new(),
            }),
        }
    }

    async fn stream(
        &self,
        command: &str,
        args: &[String],
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<()> {
        let line = command_line(command, args);
        self.calls.lock().unwrap().push(line.clone());
        if self.unstartable {
            return Err(spawn_error(command));
        }

        let chunks = self
            .streams
            .lock()
            .unwrap()
            .get(&line)
            .cloned()
            .unwrap_or_else(|| {
                vec![
                    StreamChunk::Error(format!("{line}: No such file or directory")),
                    StreamChunk::Exit(1),
                ]
            });

        for chunk in chunks {
            // Let other streams interleave, like a real pipe would.
            tokio::task::yield_now().await;
            on_chunk(chunk);
        }
        Ok(())
    }
}
