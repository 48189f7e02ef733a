pub mod glob;
pub mod hash;
pub mod scan;
pub mod tree;

use tracing::debug;

use crate::exec::{CommandOutput, CommandRunner, StreamChunk};
use crate::{Error, Result};

pub use hash::{BinaryFileData, HashOptions, HashReport, HashType};
pub use scan::{FindGlobsResult, FindOptions, Globs};
pub use tree::{DiscoveredDirectory, DiscoveredEntry, EntryKind};

/// stderr fragments that mean "the path isn't there" rather than a real failure.
pub const DEFAULT_IGNORED_ERRORS: &[&str] = &["no such file", "file not found"];

/// What a listing tolerates on top of [`DEFAULT_IGNORED_ERRORS`].
pub const LS_IGNORED_ERRORS: &[&str] = &["no such file", "file not found", "permission denied"];

/// Filesystem operations against an image, built on a [`CommandRunner`].
pub struct ImageFs<R> {
    runner: R,
}

impl<R: CommandRunner> ImageFs<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn exec(&self, command: &str, args: &[String]) -> Result<CommandOutput> {
        self.runner.run(command, args).await
    }

    /// Like [`exec`](Self::exec), but a failure whose stderr contains one of
    /// `ignored` (case-insensitive) is returned as a normal result holding
    /// whatever the command printed before it gave up.
    pub async fn exec_safe(
        &self,
        command: &str,
        args: &[String],
        ignored: &[&str],
    ) -> Result<CommandOutput> {
        match self.runner.run(command, args).await {
            Err(Error::CommandFailed {
                command,
                exit_code,
                stdout,
                stderr,
            }) => {
                if is_ignored(&stderr, ignored) {
                    debug!(
                        command = %command,
                        exit_code,
                        stderr = %stderr.trim(),
                        "Ignoring expected command failure"
                    );
                    Ok(CommandOutput { stdout, stderr })
                } else {
                    Err(Error::CommandFailed {
                        command,
                        exit_code,
                        stdout,
                        stderr,
                    })
                }
            }
            other => other,
        }
    }

    /// `ls -lan <path>`, or `ls -lanR <path>` when `recursive`.
    pub async fn ls(&self, path: &str, recursive: bool) -> Result<CommandOutput> {
        self.exec("ls", &ls_args(path, recursive)).await
    }

    /// [`ls`](Self::ls) that tolerates missing paths and unreadable directories.
    pub async fn ls_safe(&self, path: &str, recursive: bool) -> Result<CommandOutput> {
        self.exec_safe("ls", &ls_args(path, recursive), LS_IGNORED_ERRORS)
            .await
    }

    /// Read a small text file. A missing file reads as empty.
    pub async fn cat_safe(&self, path: &str) -> Result<String> {
        let out = self
            .exec_safe("cat", &[path.to_string()], DEFAULT_IGNORED_ERRORS)
            .await?;
        Ok(out.stdout)
    }

    /// Stream a file's bytes out of the image, chunk by chunk.
    pub async fn stream_file(
        &self,
        path: &str,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<()> {
        self.runner
            .stream("cat", &[path.to_string()], on_chunk)
            .await
    }
}

fn ls_args(path: &str, recursive: bool) -> Vec<String> {
    let flags = if recursive { "-lanR" } else { "-lan" };
    vec![flags.to_string(), path.to_string()]
}

fn is_ignored(stderr: &str, ignored: &[&str]) -> bool {
    let stderr = stderr.to_lowercase();
    ignored
        .iter()
        .any(|pattern| stderr.contains(&pattern.to_lowercase()))
}
