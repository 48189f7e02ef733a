pub mod container;

use async_trait::async_trait;
use serde::Serialize;

use crate::Result;

pub use container::{ContainerRunner, Target};

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// One event of a streamed command.
///
/// A stream produces any number of `Data` and `Error` chunks followed by
/// exactly one `Exit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Data(Vec<u8>),
    Error(String),
    Exit(i32),
}

/// Runs commands inside (or against) the target image.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion. A non-zero exit is an
    /// [`Error::CommandFailed`](crate::Error::CommandFailed) carrying both
    /// captured streams.
    async fn run(&self, command: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run a command and hand its stdout to `on_chunk` as it arrives.
    ///
    /// Returns `Err` only if the command could not be started; everything that
    /// happens after that is reported through the chunks.
    async fn stream(
        &self,
        command: &str,
        args: &[String],
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<()>;
}
