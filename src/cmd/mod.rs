pub mod cat;
pub mod find;
pub mod hash;
pub mod scan;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use serde::Serialize;

use rummage::config::{self, ScanConfig};
use rummage::exec::{ContainerRunner, Target};
use rummage::image::ImageFs;

/// How to reach the image, shared by every subcommand.
pub struct TargetArgs<'a> {
    pub image: &'a str,
    pub container: bool,
    pub user: Option<String>,
}

/// Glob selection from the command line, layered over the config file.
#[derive(Debug, Default)]
pub struct GlobOverrides {
    pub manifest_globs: Vec<String>,
    pub binary_globs: Vec<String>,
    pub exclusion_globs: Vec<String>,
    pub exclude_root_dirs: Vec<String>,
}

#[derive(Debug, Default)]
pub struct HashOverrides {
    pub hash_type: Option<String>,
    pub concurrency: Option<usize>,
}

pub fn image_fs(target: TargetArgs<'_>) -> Result<ImageFs<ContainerRunner>> {
    let cfg = config::get();
    let rt = cfg.probe.selected().context(
        "No container runtime detected. Install Docker or Podman, or pass --runtime.",
    )?;

    let target_kind = if target.container {
        Target::Container(target.image.to_string())
    } else {
        Target::Image(target.image.to_string())
    };
    let runner = ContainerRunner::new(rt.binary_path.display().to_string(), target_kind)
        .with_user(target.user);
    Ok(ImageFs::new(runner))
}

/// Load the config file (if any) and apply command-line overrides on top.
pub fn scan_config(
    path: Option<&Path>,
    globs: &GlobOverrides,
    hash: &HashOverrides,
) -> Result<ScanConfig> {
    let mut cfg = match path {
        Some(p) => ScanConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => ScanConfig::default(),
    };

    cfg.manifest_globs.extend(globs.manifest_globs.iter().cloned());
    cfg.binary_globs.extend(globs.binary_globs.iter().cloned());
    cfg.exclusion_globs.extend(globs.exclusion_globs.iter().cloned());
    if !globs.exclude_root_dirs.is_empty() {
        cfg.exclude_root_directories = globs.exclude_root_dirs.clone();
    }
    if let Some(hash_type) = &hash.hash_type {
        cfg.hash_type = hash_type.parse()?;
    }
    if let Some(concurrency) = hash.concurrency {
        cfg.hash_concurrency = concurrency;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Write `value` as pretty JSON to stdout (`-`) or to a file.
pub fn write_json<T: Serialize>(dest: &str, value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value)?;
    if dest == "-" {
        println!("{output}");
    } else {
        fs::write(dest, &output).with_context(|| format!("Failed to write JSON to {dest}"))?;
        eprintln!("{} Wrote {dest}", "✔".green());
    }
    Ok(())
}
