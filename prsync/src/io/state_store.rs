//! Tracking document storage (`.prsync/state.json` by default).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::state::StateDocument;

/// Cross-run storage for the tracking document.
///
/// Loading never fails: an absent or unreadable document is an empty one.
pub trait StateStore {
    fn load(&self) -> StateDocument;
    fn save(&self, doc: &StateDocument) -> Result<()>;
}

/// JSON file store with atomic rewrites.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> StateDocument {
        debug!(path = %self.path.display(), "loading state");
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no state file yet; starting empty");
                return StateDocument::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cannot read state file; starting empty");
                return StateDocument::default();
            }
        };
        if contents.trim().is_empty() {
            warn!(path = %self.path.display(), "state file is empty; starting empty");
            return StateDocument::default();
        }
        match serde_json::from_str::<StateDocument>(&contents) {
            Ok(doc) => {
                debug!(
                    review_requests = doc.review_requests.len(),
                    reviews_received = doc.reviews_received.len(),
                    "state loaded"
                );
                doc
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "malformed state file; starting empty");
                StateDocument::default()
            }
        }
    }

    fn save(&self, doc: &StateDocument) -> Result<()> {
        debug!(path = %self.path.display(), open_tasks = doc.open_task_count(), "writing state");
        let mut buf = serde_json::to_string_pretty(doc).context("serialize state")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}
