use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::glob::{Classifier, FileClass};
use super::tree::{self, DiscoveredDirectory};
use super::ImageFs;
use crate::exec::CommandRunner;
use crate::Result;

/// Yield to the scheduler after this many walked entries.
const YIELD_EVERY: usize = 1024;

/// Top-level pseudo-filesystems that are never listed during a root scan.
pub const DEFAULT_EXCLUDED_ROOT_DIRS: &[&str] = &["dev", "proc", "sys"];

/// Patterns that select the files worth reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Globs {
    /// Files holding package metadata (lockfiles, package databases, ...).
    pub manifest_globs: Vec<String>,
    /// Installed files to fingerprint by hash.
    pub binary_globs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOptions {
    /// Directory to scan. Defaults to `/`.
    pub path: String,
    pub recursive: bool,
    /// Paths matching any of these are dropped before classification.
    pub exclusion_globs: Vec<String>,
    /// Top-level directory names skipped entirely when scanning `/`
    /// recursively.
    pub excluded_root_dirs: Vec<String>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            recursive: true,
            exclusion_globs: Vec::new(),
            excluded_root_dirs: DEFAULT_EXCLUDED_ROOT_DIRS
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

/// Absolute paths of the files that matched, by class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindGlobsResult {
    pub manifest_files: Vec<String>,
    pub binary_files: Vec<String>,
}

impl FindGlobsResult {
    fn with(mut self, class: FileClass, path: String) -> Self {
        match class {
            FileClass::Manifest => self.manifest_files.push(path),
            FileClass::Binary => self.binary_files.push(path),
        }
        self
    }
}

impl<R: CommandRunner> ImageFs<R> {
    /// Find every file in the image that matches `globs`.
    ///
    /// A recursive scan of `/` lists each top-level directory separately so
    /// pseudo-filesystems can be skipped and one bad directory doesn't sink the
    /// whole scan.
    pub async fn find_globs(&self, globs: &Globs, options: &FindOptions) -> Result<FindGlobsResult> {
        let root = if options.path.is_empty() { "/" } else { options.path.as_str() };

        let tree = if root == "/" && options.recursive {
            self.list_root(&options.excluded_root_dirs).await?
        } else {
            // Trailing slash so a symlinked directory lists its contents.
            let listed = format!("{}/", root.trim_end_matches('/'));
            let out = self.ls_safe(&listed, options.recursive).await?;
            tree::parse_listing(&out.stdout, &listed)
        };

        let classifier = Classifier {
            exclusion: &options.exclusion_globs,
            manifest: &globs.manifest_globs,
            binary: &globs.binary_globs,
        };

        let mut result = FindGlobsResult::default();
        for (i, entry) in tree.files_iter().enumerate() {
            if i > 0 && i % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
            let path = entry.absolute_path(root);
            if let Some(class) = classifier.classify(&path) {
                result = result.with(class, path);
            }
        }

        info!(
            path = %root,
            manifests = result.manifest_files.len(),
            binaries = result.binary_files.len(),
            "Glob scan finished"
        );
        Ok(result)
    }

    /// List `/` one top-level directory at a time and stitch the pieces
    /// together into one tree rooted at `/`.
    async fn list_root(&self, excluded: &[String]) -> Result<DiscoveredDirectory> {
        let out = self.ls_safe("/", false).await?;
        let mut root = tree::parse_listing(&out.stdout, "/");

        let names: Vec<String> = root.sub_dirs.iter().map(|d| d.name.clone()).collect();
        for name in names {
            if excluded.iter().any(|e| e.trim_matches('/') == name) {
                debug!(dir = %name, "Skipping excluded root directory");
                continue;
            }

            let dir_path = format!("/{name}");
            let listing = match self.ls_safe(&dir_path, true).await {
                Ok(out) => out,
                Err(e) => {
                    warn!(dir = %dir_path, error = %e, "Failed to list directory, skipping");
                    continue;
                }
            };

            let sub = tree::parse_listing(&listing.stdout, &dir_path);
            let sub = DiscoveredDirectory {
                name: name.clone(),
                path: String::new(),
                ..sub
            }
            .rerooted(&name);
            debug!(dir = %dir_path, files = sub.file_count(), "Listed root directory");
            root.splice(sub);
        }

        Ok(root)
    }
}
