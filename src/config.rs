use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::image::scan::DEFAULT_EXCLUDED_ROOT_DIRS;
use crate::image::{FindOptions, Globs, HashOptions, HashType};
use crate::probe::{self, ProbeResult, RuntimeKind};
use crate::{Error, Result};

/// Scan settings, loadable from a JSON file. Every field is optional.
///
/// ```json
/// {
///   "manifest_globs": ["**/package.json", "**/var/lib/rpm/Packages"],
///   "binary_globs": ["**/bin/node", "**/bin/java"],
///   "exclusion_globs": ["**/node_modules/**/test/**"],
///   "hash_type": "sha256"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub manifest_globs: Vec<String>,
    pub binary_globs: Vec<String>,
    pub exclusion_globs: Vec<String>,
    /// Top-level directories never listed during a root scan.
    pub exclude_root_directories: Vec<String>,
    pub hash_type: HashType,
    /// Binaries streamed at once while hashing.
    pub hash_concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            manifest_globs: Vec::new(),
            binary_globs: Vec::new(),
            exclusion_globs: Vec::new(),
            exclude_root_directories: DEFAULT_EXCLUDED_ROOT_DIRS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            hash_type: HashType::default(),
            hash_concurrency: 1,
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScanConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hash_concurrency == 0 {
            return Err(Error::Config("hash_concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn globs(&self) -> Globs {
        Globs {
            manifest_globs: self.manifest_globs.clone(),
            binary_globs: self.binary_globs.clone(),
        }
    }

    pub fn find_options(&self, path: &str, recursive: bool) -> FindOptions {
        FindOptions {
            path: path.to_string(),
            recursive,
            exclusion_globs: self.exclusion_globs.clone(),
            excluded_root_dirs: self.exclude_root_directories.clone(),
        }
    }

    pub fn hash_options(&self) -> HashOptions {
        HashOptions {
            hash_type: self.hash_type,
            concurrency: self.hash_concurrency,
        }
    }
}

/// Process-wide settings resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub probe: ProbeResult,
}

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Probe for runtimes and store the result. Call once, before [`get`].
pub fn init_from_cli(runtime: Option<String>) -> Result<()> {
    let preferred = runtime.as_deref().map(str::parse::<RuntimeKind>).transpose()?;
    let probe = probe::probe(preferred);

    if let (Some(kind), None) = (preferred, probe.default) {
        return Err(Error::Config(format!("runtime '{kind}' not found on PATH")));
    }

    CONFIG
        .set(AppConfig { probe })
        .map_err(|_| Error::Config("configuration already initialised".into()))
}

/// The startup configuration. Falls back to a default probe if
/// [`init_from_cli`] was never called.
pub fn get() -> &'static AppConfig {
    CONFIG.get_or_init(|| AppConfig {
        probe: probe::probe(None),
    })
}
