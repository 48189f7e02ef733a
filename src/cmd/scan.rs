use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use rummage::image::{BinaryFileData, HashType};

use super::{GlobOverrides, HashOverrides, TargetArgs};
use crate::progress::Spinner;

#[derive(Serialize)]
struct ScanReport {
    image: String,
    hash_type: HashType,
    manifest_files: Vec<String>,
    binary_files: Vec<BinaryFileData>,
    /// Binaries that matched but could not be read.
    unreadable: usize,
}

pub async fn run(
    target: TargetArgs<'_>,
    config_path: Option<&Path>,
    globs: &GlobOverrides,
    hash: &HashOverrides,
    path: &str,
    recursive: bool,
    json: Option<&str>,
) -> Result<()> {
    let cfg = super::scan_config(config_path, globs, hash)?;
    let image = target.image.to_string();
    let fs = super::image_fs(target)?;

    let spinner = Spinner::new(format!("Listing {path} in {image} ..."));
    let found = fs
        .find_globs(&cfg.globs(), &cfg.find_options(path, recursive))
        .await
        .with_context(|| format!("Failed to scan {image}"))?;

    spinner.finish(format!(
        "Found {} manifest files and {} binaries",
        found.manifest_files.len(),
        found.binary_files.len()
    ));

    let progress = Spinner::counter(found.binary_files.len(), "Hashing binaries");
    let hashed = fs
        .hash_files_with_progress(&found.binary_files, &cfg.hash_options(), |_| progress.inc())
        .await
        .with_context(|| format!("Failed to hash files in {image}"))?;
    if hashed.dropped > 0 {
        progress.warn(format!("{} binaries could not be read", hashed.dropped));
    }
    progress.finish(format!("Hashed {} binaries ({})", hashed.files.len(), cfg.hash_type));

    let report = ScanReport {
        image,
        hash_type: cfg.hash_type,
        manifest_files: found.manifest_files,
        binary_files: hashed.files,
        unreadable: hashed.dropped,
    };

    if let Some(dest) = json {
        return super::write_json(dest, &report);
    }

    println!("{}", report.image);
    println!("  manifests:");
    for path in &report.manifest_files {
        println!("    {path}");
    }
    println!("  binaries ({}):", report.hash_type);
    for file in &report.binary_files {
        println!("    {}  {}/{}", file.hash, file.path.trim_end_matches('/'), file.name);
    }
    Ok(())
}
