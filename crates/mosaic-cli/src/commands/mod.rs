pub mod config;
pub mod info;
pub mod list;
pub mod mosaic;
pub mod movie;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Environment variable naming the default local archive mirror.
pub const MIRROR_ENV: &str = "MOSAIC_DATA";

/// Read a file list: one entry per line, blank lines and `#` comments skipped.
pub fn read_filelist(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file list {}", path.display()))?;
    let entries: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    if entries.is_empty() {
        bail!("File list {} has no entries", path.display());
    }
    Ok(entries)
}

/// Mirror directory from the flag, falling back to `$MOSAIC_DATA`.
pub fn mirror_dir(flag: Option<&PathBuf>) -> Option<PathBuf> {
    flag.cloned()
        .or_else(|| std::env::var_os(MIRROR_ENV).map(PathBuf::from))
}

/// Load a TOML config file, or the type's defaults when none is given.
pub fn load_toml<T>(path: Option<&PathBuf>) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Invalid config {}", path.display()))
}
