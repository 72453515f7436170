//! Named snapshots of the topology and event log on disk

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ObjectKind, TopologyDocument, TopologySnapshot};
use crate::{Result, SimulatorError};

const SNAPSHOT_EXTENSION: &str = "json";

/// On-disk representation of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(flatten)]
    pub document: TopologyDocument,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    /// Event log at save time, newest first
    #[serde(default)]
    pub events: Vec<String>,
}

impl SnapshotFile {
    pub fn new(topology: TopologySnapshot, events: Vec<String>) -> Self {
        Self {
            document: TopologyDocument::new(topology),
            saved_at: Some(Utc::now()),
            events,
        }
    }
}

/// Directory of `<name>.json` snapshot files
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, name: &str, snapshot: &SnapshotFile) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&path, json).await?;

        tracing::info!("[SNAPSHOT] saved '{}' to {}", name, path.display());
        Ok(path)
    }

    /// Read and version-check a snapshot
    pub async fn load(&self, name: &str) -> Result<SnapshotFile> {
        let path = self.path_for(name)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SimulatorError::not_found(ObjectKind::Snapshot, name));
            }
            Err(err) => return Err(err.into()),
        };

        let snapshot: SnapshotFile = serde_json::from_str(&raw)?;
        snapshot.document.check_version()?;

        tracing::info!("[SNAPSHOT] loaded '{}' from {}", name, path.display());
        Ok(snapshot)
    }

    /// Names of stored snapshots, sorted
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{SNAPSHOT_EXTENSION}")))
    }
}

/// Snapshot names map to file names; only `[A-Za-z0-9_-]` is accepted
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SimulatorError::validation(
            Some(name.to_string()),
            "snapshot names may only contain letters, digits, '-' and '_'",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::reference_topology;

    #[tokio::test]
    async fn test_save_load_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshots"));
        assert!(store.list().await.unwrap().is_empty());

        let file = SnapshotFile::new(reference_topology(), vec!["[t] SYSTEM: saved".to_string()]);
        store.save("before-cut", &file).await.unwrap();
        store.save("baseline", &file).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["baseline", "before-cut"]);

        let loaded = store.load("before-cut").await.unwrap();
        assert_eq!(loaded.document.topology, reference_topology());
        assert_eq!(loaded.events, file.events);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let err = store.load("nope").await.unwrap_err();
        assert!(matches!(err, SimulatorError::NotFound { kind: ObjectKind::Snapshot, .. }));
    }

    #[tokio::test]
    async fn test_rejects_path_like_names_and_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let file = SnapshotFile::new(reference_topology(), Vec::new());

        let err = store.save("../escape", &file).await.unwrap_err();
        assert!(matches!(err, SimulatorError::Validation { .. }));

        let mut old = file.clone();
        old.document.version = "0.9.0".to_string();
        store.save("old", &old).await.unwrap();
        let err = store.load("old").await.unwrap_err();
        assert!(matches!(err, SimulatorError::UnsupportedVersion { .. }));
    }
}
