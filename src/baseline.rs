//! Baseline inventory: the expected per-class object counts.
//!
//! The baseline is mutated only by an authorized "set baseline" or by alarm
//! acknowledgment, persisted on every mutation, and loaded once at startup.
//! A missing or corrupt baseline file is non-fatal and yields an empty
//! baseline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::detect::CountSnapshot;

/// Expected per-class object counts defining "normal" state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Baseline(pub BTreeMap<String, u32>);

impl Baseline {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn expected(&self, class: &str) -> u32 {
        self.0.get(class).copied().unwrap_or(0)
    }

    /// Build a baseline from a live count snapshot.
    pub fn from_counts(counts: &CountSnapshot) -> Self {
        Self(counts.clone())
    }
}

impl std::fmt::Display for Baseline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        write!(f, "{{")?;
        for (class, count) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{class}: {count}")?;
            first = false;
        }
        write!(f, "}}")
    }
}

/// JSON-file persistence for the baseline.
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored baseline. Missing or corrupt files reset to empty.
    pub fn load(&self) -> Baseline {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Baseline::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(baseline) => baseline,
            Err(e) => {
                log::warn!(
                    "baseline file {} is corrupt ({}); starting with an empty baseline",
                    self.path.display(),
                    e
                );
                Baseline::default()
            }
        }
    }

    /// Persist the baseline, pretty-printed.
    ///
    /// Writes to a sibling temp file and renames into place; good enough for
    /// the single-writer model.
    pub fn save(&self, baseline: &Baseline) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create baseline dir {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(baseline)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("write baseline temp file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace baseline file {}", self.path.display()))?;
        Ok(())
    }
}
