// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Point-in-time serialisation of all wants.

use mw_core::{HistoryEntry, WantManifest, WantMeta, WantSpec, WantStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors from snapshot persistence
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode snapshot {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("snapshot {path} has unsupported version {version}")]
    Version { path: PathBuf, version: u32 },
}

/// One want as persisted: declaration plus runtime fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WantSnapshot {
    pub metadata: WantMeta,
    pub spec: WantSpec,
    pub status: WantStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state: BTreeMap<String, Value>,
    #[serde(default, rename = "historyTail", skip_serializing_if = "Vec::is_empty")]
    pub history_tail: Vec<HistoryEntry>,
    #[serde(default)]
    pub cycle: u64,
}

impl WantSnapshot {
    /// The declared part of this snapshot entry.
    pub fn manifest(&self) -> WantManifest {
        WantManifest { metadata: self.metadata.clone(), spec: self.spec.clone() }
    }
}

/// A full runtime snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(rename = "takenAtMs")]
    pub taken_at_ms: u64,
    pub wants: Vec<WantSnapshot>,
}

impl Snapshot {
    pub fn new(taken_at_ms: u64, wants: Vec<WantSnapshot>) -> Self {
        Self { version: SNAPSHOT_VERSION, taken_at_ms, wants }
    }

    pub fn get(&self, name: &str) -> Option<&WantSnapshot> {
        self.wants.iter().find(|w| w.metadata.name == name)
    }
}

/// Reads and writes snapshots at a fixed path.
///
/// Writes go through a `.tmp` sibling and an atomic rename so a crash never
/// leaves a torn snapshot behind.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, or `None` if the file does not exist yet.
    pub fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Read { path: self.path.clone(), source }),
        };
        let snapshot: Snapshot = serde_json::from_slice(&data)
            .map_err(|source| SnapshotError::Decode { path: self.path.clone(), source })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                path: self.path.clone(),
                version: snapshot.version,
            });
        }
        debug!(
            path = %self.path.display(),
            wants = snapshot.wants.len(),
            "loaded snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Write the snapshot atomically (tmp + rename).
    pub fn write(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|source| SnapshotError::Write { path: self.path.clone(), source })?;
            }
        }
        let data = serde_json::to_vec_pretty(snapshot).map_err(SnapshotError::Encode)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &data)
            .map_err(|source| SnapshotError::Write { path: tmp.clone(), source })?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|source| SnapshotError::Write { path: self.path.clone(), source })?;
        debug!(
            path = %self.path.display(),
            wants = snapshot.wants.len(),
            bytes = data.len(),
            "wrote snapshot"
        );
        Ok(())
    }

    /// Write, logging instead of failing. Used on the reconciler hot path
    /// where a transient disk error must not abort the pass.
    pub fn write_logged(&self, snapshot: &Snapshot) {
        if let Err(e) = self.write(snapshot) {
            warn!(error = %e, "snapshot write failed");
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
