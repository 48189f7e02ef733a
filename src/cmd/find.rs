use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;

use rummage::image::FindGlobsResult;

use super::{GlobOverrides, HashOverrides, TargetArgs};
use crate::progress::Spinner;

pub async fn run(
    target: TargetArgs<'_>,
    config_path: Option<&Path>,
    globs: &GlobOverrides,
    path: &str,
    recursive: bool,
    json: Option<&str>,
) -> Result<()> {
    let cfg = super::scan_config(config_path, globs, &HashOverrides::default())?;
    let image = target.image.to_string();
    let fs = super::image_fs(target)?;

    let spinner = Spinner::new(format!("Listing {path} in {image} ..."));
    let result = fs
        .find_globs(&cfg.globs(), &cfg.find_options(path, recursive))
        .await
        .with_context(|| format!("Failed to scan {image}"))?;
    spinner.finish(format!(
        "Found {} manifest and {} binary files",
        result.manifest_files.len(),
        result.binary_files.len()
    ));

    match json {
        Some(dest) => super::write_json(dest, &result),
        None => {
            print_result(&result);
            Ok(())
        }
    }
}

pub fn print_result(result: &FindGlobsResult) {
    println!("{} ({})", "Manifest files".bold(), result.manifest_files.len());
    for path in &result.manifest_files {
        println!("  {path}");
    }
    println!("{} ({})", "Binary files".bold(), result.binary_files.len());
    for path in &result.binary_files {
        println!("  {path}");
    }
}
