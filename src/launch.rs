// First-visit flag gating the splash sequence on the landing page

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

const FLAG_FILE: &str = "seedsync-loading-seen";

pub struct LaunchFlag {
    path: PathBuf,
    seen: AtomicBool,
}

impl LaunchFlag {
    /// Reads the persisted flag. A missing file means the splash has never been shown.
    pub fn load(state_dir: &Path) -> Self {
        let path = state_dir.join(FLAG_FILE);
        let seen = path.exists();
        tracing::info!(seen, path = %path.display(), "Loaded first-visit flag");
        Self { path, seen: AtomicBool::new(seen) }
    }

    pub fn is_first_visit(&self) -> bool {
        !self.seen.load(Ordering::Acquire)
    }

    /// Records that the splash finished. Persisting is best effort; the in-memory flag always flips.
    pub fn mark_seen(&self) {
        if self.seen.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.persist() {
            tracing::warn!("Failed to persist first-visit flag to {}: {}", self.path.display(), e);
        }
    }

    fn persist(&self) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, b"true")
    }
}
