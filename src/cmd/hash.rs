use std::path::Path;

use anyhow::{Context, Result};

use rummage::image::HashReport;

use super::{GlobOverrides, HashOverrides, TargetArgs};
use crate::progress::Spinner;

pub async fn run(
    target: TargetArgs<'_>,
    config_path: Option<&Path>,
    hash: &HashOverrides,
    paths: &[String],
    json: Option<&str>,
) -> Result<()> {
    let cfg = super::scan_config(config_path, &GlobOverrides::default(), hash)?;
    let image = target.image.to_string();
    let fs = super::image_fs(target)?;

    let spinner = Spinner::counter(paths.len(), format!("Hashing files in {image}"));
    let report = fs
        .hash_files_with_progress(paths, &cfg.hash_options(), |_| spinner.inc())
        .await
        .with_context(|| format!("Failed to hash files in {image}"))?;
    if report.dropped > 0 {
        spinner.warn(format!("{} files could not be read", report.dropped));
    }
    spinner.finish(format!("Hashed {} files ({})", report.files.len(), cfg.hash_type));

    match json {
        Some(dest) => super::write_json(dest, &report),
        None => {
            print_report(&report);
            Ok(())
        }
    }
}

/// `sha1sum`-style `<hash>  <path>` lines.
pub fn print_report(report: &HashReport) {
    for file in &report.files {
        let dir = file.path.trim_end_matches('/');
        println!("{}  {dir}/{}", file.hash, file.name);
    }
}
