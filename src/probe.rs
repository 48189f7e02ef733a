use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::Error;

/// Container runtimes whose CLI can run commands in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    /// Probe order when no runtime is requested.
    pub const ALL: [RuntimeKind; 2] = [RuntimeKind::Docker, RuntimeKind::Podman];

    pub fn binary_name(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

impl FromStr for RuntimeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(RuntimeKind::Docker),
            "podman" => Ok(RuntimeKind::Podman),
            other => Err(Error::Config(format!(
                "unknown runtime '{other}' (expected docker or podman)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeInfo {
    pub kind: RuntimeKind,
    pub binary_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub runtimes: Vec<RuntimeInfo>,
    /// Index into `runtimes` of the one to use.
    pub default: Option<usize>,
}

impl ProbeResult {
    pub fn selected(&self) -> Option<&RuntimeInfo> {
        self.default.and_then(|i| self.runtimes.get(i))
    }
}

/// Look for every known runtime on `$PATH`. The default is `preferred` when
/// given (none if it isn't installed), otherwise the first one found.
pub fn probe(preferred: Option<RuntimeKind>) -> ProbeResult {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    probe_in(&path_var, preferred)
}

fn probe_in(path_var: &OsStr, preferred: Option<RuntimeKind>) -> ProbeResult {
    let runtimes: Vec<RuntimeInfo> = RuntimeKind::ALL
        .iter()
        .filter_map(|&kind| {
            find_in_path(kind.binary_name(), path_var).map(|binary_path| RuntimeInfo {
                kind,
                binary_path,
            })
        })
        .collect();

    let default = match preferred {
        Some(kind) => runtimes.iter().position(|rt| rt.kind == kind),
        None if runtimes.is_empty() => None,
        None => Some(0),
    };

    ProbeResult { runtimes, default }
}

fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
