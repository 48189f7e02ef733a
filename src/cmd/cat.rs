use std::io::{self, Write};

use anyhow::{Context, Result};

use super::TargetArgs;

pub async fn run(target: TargetArgs<'_>, path: &str) -> Result<()> {
    let image = target.image.to_string();
    let fs = super::image_fs(target)?;

    let content = fs
        .cat_safe(path)
        .await
        .with_context(|| format!("Failed to read {path} from {image}"))?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
