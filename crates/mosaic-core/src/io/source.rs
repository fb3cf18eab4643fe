use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MosaicError, Result};
use crate::io::archive::archive_relative_path;

/// Fetches a remote stamp locator into a local file.
pub trait RemoteFetch: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<PathBuf>;
}

/// Turns a stamp locator (local path or archive URL) into a readable file.
///
/// Lookup order is fixed and explicit:
/// 1. the locator itself, if it names an existing file;
/// 2. `local_override/<file name>`;
/// 3. the mirror: the locator's path below the archive `missions/` root
///    (or the locator itself, if relative) joined onto `mirror`;
/// 4. the remote fetcher.
#[derive(Default)]
pub struct StampSourceResolver {
    pub local_override: Option<PathBuf>,
    pub mirror: Option<PathBuf>,
    remote: Option<Box<dyn RemoteFetch>>,
}

impl StampSourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_override(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_override = Some(dir.into());
        self
    }

    pub fn with_mirror(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mirror = Some(dir.into());
        self
    }

    pub fn with_remote(mut self, remote: Box<dyn RemoteFetch>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn resolve(&self, locator: &str) -> Result<PathBuf> {
        let direct = Path::new(locator);
        if direct.is_file() {
            debug!(locator, "Resolved stamp directly");
            return Ok(direct.to_path_buf());
        }

        if let Some(dir) = &self.local_override {
            if let Some(name) = file_name(locator) {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    debug!(locator, path = %candidate.display(), "Resolved stamp from local override");
                    return Ok(candidate);
                }
            }
        }

        if let Some(mirror) = &self.mirror {
            let relative = archive_relative_path(locator)
                .or_else(|| direct.is_relative().then_some(locator));
            if let Some(rel) = relative {
                let candidate = mirror.join(rel);
                if candidate.is_file() {
                    debug!(locator, path = %candidate.display(), "Resolved stamp from mirror");
                    return Ok(candidate);
                }
            }
        }

        if let Some(remote) = &self.remote {
            debug!(locator, "Fetching stamp from remote");
            return remote
                .fetch(locator)
                .map_err(|e| MosaicError::stamp_load(locator, e));
        }

        Err(MosaicError::stamp_load(
            locator,
            "not found locally, in the override directory, or in the mirror",
        ))
    }
}

fn file_name(locator: &str) -> Option<&str> {
    locator
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}
