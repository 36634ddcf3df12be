//! Authorized selection scripts.
//!
//! When a directory of authorized scripts is configured, only scripts
//! whose trimmed body matches (by SHA-256) one of the files in it may run.
//! The directory is re-read once the refresh period has elapsed since the
//! last load; a failed refresh keeps the previous allow-list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info};

use rmgrid_core::SelectionScript;

use crate::error::{SelectionError, SelectionResult};

#[derive(Debug, Default)]
pub struct ScriptAuthorizer {
    dir: Option<PathBuf>,
    /// `None` accepts every script.
    allowed: Option<HashSet<String>>,
    refresh: Duration,
    loaded_at: Option<Instant>,
}

impl ScriptAuthorizer {
    /// Accept every script.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Accept only scripts whose bodies are stored in `dir`, re-reading it
    /// at most once per `refresh`.
    pub fn from_dir(dir: &Path, refresh: Duration) -> SelectionResult<Self> {
        let mut authorizer = Self {
            dir: Some(dir.to_path_buf()),
            allowed: None,
            refresh,
            loaded_at: None,
        };
        authorizer.reload()?;
        Ok(authorizer)
    }

    /// Re-read the authorized script directory.
    pub fn reload(&mut self) -> SelectionResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        self.loaded_at = Some(Instant::now());
        let mut allowed = HashSet::new();
        for entry in std::fs::read_dir(dir).map_err(SelectionError::AuthorizedScripts)? {
            let path = entry.map_err(SelectionError::AuthorizedScripts)?.path();
            if !path.is_file() {
                continue;
            }
            let body = std::fs::read_to_string(&path).map_err(SelectionError::AuthorizedScripts)?;
            debug!(path = %path.display(), "authorized selection script loaded");
            allowed.insert(rmgrid_core::content_digest(&body));
        }
        info!(dir = %dir.display(), count = allowed.len(), "authorized scripts loaded");
        self.allowed = Some(allowed);
        Ok(())
    }

    /// Whether the refresh period has elapsed since the last load.
    pub fn is_stale(&self) -> bool {
        match (&self.dir, self.loaded_at) {
            (Some(_), Some(loaded_at)) => loaded_at.elapsed() >= self.refresh,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Reload if stale. Errors are logged and the previous allow-list stays.
    pub fn refresh_if_stale(&mut self) {
        if !self.is_stale() {
            return;
        }
        if let Err(e) = self.reload() {
            error!(error = %e, "refreshing authorized scripts failed, keeping previous list");
        }
    }

    pub fn check(&self, scripts: &[SelectionScript]) -> SelectionResult<()> {
        let Some(allowed) = &self.allowed else {
            return Ok(());
        };
        for script in scripts {
            let digest = script.content_digest();
            if !allowed.contains(&digest) {
                return Err(SelectionError::Unauthorized { digest });
            }
        }
        Ok(())
    }
}
