use std::fmt;
use std::str::FromStr;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tracing::{debug, info};

use super::ImageFs;
use crate::exec::{CommandRunner, StreamChunk};
use crate::{Error, Result};

/// Digest used to fingerprint binaries. This is an identity check, not a
/// security property, so the fast `sha1` is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashType::Sha1 => "sha1",
            HashType::Sha256 => "sha256",
            HashType::Sha512 => "sha512",
        };
        f.write_str(name)
    }
}

impl FromStr for HashType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(HashType::Sha1),
            "sha256" => Ok(HashType::Sha256),
            "sha512" => Ok(HashType::Sha512),
            other => Err(Error::Config(format!("unsupported hash type '{other}'"))),
        }
    }
}

enum Digester {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Digester {
    fn new(hash_type: HashType) -> Self {
        match hash_type {
            HashType::Sha1 => Digester::Sha1(Sha1::new()),
            HashType::Sha256 => Digester::Sha256(Sha256::new()),
            HashType::Sha512 => Digester::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Sha1(h) => h.update(data),
            Digester::Sha256(h) => h.update(data),
            Digester::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Digester::Sha1(h) => format!("{:x}", h.finalize()),
            Digester::Sha256(h) => format!("{:x}", h.finalize()),
            Digester::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashOptions {
    pub hash_type: HashType,
    /// Files streamed at once. 1 hashes strictly one file after another.
    pub concurrency: usize,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self {
            hash_type: HashType::default(),
            concurrency: 1,
        }
    }
}

/// Fingerprint of one binary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryFileData {
    pub name: String,
    /// Directory holding the file.
    pub path: String,
    pub hash_type: HashType,
    /// Lower-case hex digest.
    pub hash: String,
}

/// Result of hashing a batch of files.
///
/// A file whose stream fails part way (unreadable, removed, non-zero exit) has
/// no entry in `files`; it is only counted in `dropped`. A missing hash for a
/// discovered binary is an expected outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HashReport {
    pub files: Vec<BinaryFileData>,
    pub dropped: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum StreamState {
    Open,
    Failed(String),
    Exited(i32),
}

impl<R: CommandRunner> ImageFs<R> {
    /// Stream each file out of the image and digest it.
    ///
    /// Records come back in the order of `paths`. Errors only if the runtime
    /// can't start a command at all; per-file failures are dropped.
    pub async fn hash_files<S: AsRef<str>>(
        &self,
        paths: &[S],
        options: &HashOptions,
    ) -> Result<HashReport> {
        self.hash_files_with_progress(paths, options, |_| {}).await
    }

    /// [`hash_files`](Self::hash_files), calling `on_done` with each path once
    /// its stream has finished, hashed or not.
    pub async fn hash_files_with_progress<S: AsRef<str>>(
        &self,
        paths: &[S],
        options: &HashOptions,
        on_done: impl Fn(&str),
    ) -> Result<HashReport> {
        let on_done = &on_done;
        let hashed: Vec<Option<BinaryFileData>> = stream::iter(paths.iter().map(|p| async move {
            let path = p.as_ref();
            let record = self.hash_file(path, options.hash_type).await?;
            on_done(path);
            Ok::<_, Error>(record)
        }))
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

        let total = hashed.len();
        let files: Vec<BinaryFileData> = hashed.into_iter().flatten().collect();
        let dropped = total - files.len();

        info!(
            hashed = files.len(),
            dropped,
            hash_type = %options.hash_type,
            "Hashing finished"
        );
        Ok(HashReport { files, dropped })
    }

    async fn hash_file(&self, path: &str, hash_type: HashType) -> Result<Option<BinaryFileData>> {
        let mut digest = Digester::new(hash_type);
        let mut state = StreamState::Open;

        self.stream_file(path, &mut |chunk| {
            if state != StreamState::Open {
                return;
            }
            match chunk {
                StreamChunk::Data(data) => digest.update(&data),
                StreamChunk::Error(message) => state = StreamState::Failed(message),
                StreamChunk::Exit(code) => state = StreamState::Exited(code),
            }
        })
        .await?;

        match state {
            StreamState::Exited(0) => {
                let (dir, name) = split_path(path);
                Ok(Some(BinaryFileData {
                    name: name.to_string(),
                    path: dir.to_string(),
                    hash_type,
                    hash: digest.finalize_hex(),
                }))
            }
            StreamState::Exited(code) => {
                debug!(path = %path, exit_code = code, "Dropping file, stream exited non-zero");
                Ok(None)
            }
            StreamState::Failed(message) => {
                debug!(path = %path, error = %message, "Dropping file, stream failed");
                Ok(None)
            }
            StreamState::Open => {
                debug!(path = %path, "Dropping file, stream never finished");
                Ok(None)
            }
        }
    }
}

/// `/usr/bin/node` -> (`/usr/bin`, `node`).
fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}
