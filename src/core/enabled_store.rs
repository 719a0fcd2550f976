// src/core/enabled_store.rs

//! Persists the set of enabled flag names.

use super::flags::Name;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait EnabledStore: Send + Sync {
    /// Returns the persisted enabled names, or an empty list if no record exists
    /// yet.
    async fn read(&self) -> anyhow::Result<Vec<Name>>;

    /// Atomically replaces the persisted record.
    async fn write(&self, names: &[Name]) -> anyhow::Result<()>;
}

/// Persists the enabled set as a JSON array of strings at a fixed path, writing to
/// a sibling temp file and renaming over the target so a crash mid-write never
/// leaves a truncated record. Mirrors `ClusterState::save_config`'s
/// write-then-rename discipline.
pub struct FileEnabledStore {
    path: PathBuf,
}

impl FileEnabledStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EnabledStore for FileEnabledStore {
    async fn read(&self) -> anyhow::Result<Vec<Name>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let names: Vec<String> = serde_json::from_str(&raw)?;
        Ok(names.into_iter().map(Name::from).collect())
    }

    async fn write(&self, names: &[Name]) -> anyhow::Result<()> {
        let raw: Vec<&str> = names.iter().map(Name::as_str).collect();
        let serialized = serde_json::to_string(&raw)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path: PathBuf = tmp_path_for(&self.path);
        tokio::fs::write(&tmp_path, serialized).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let suffix: u32 = rand::random();
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".tmp-{suffix}"));
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEnabledStore::new(dir.path().join("enabled.json"));

        assert_eq!(store.read().await.unwrap(), Vec::<Name>::new());

        let names = vec![Name::from("a"), Name::from("b")];
        store.write(&names).await.unwrap();
        assert_eq!(store.read().await.unwrap(), names);

        let fewer = vec![Name::from("b")];
        store.write(&fewer).await.unwrap();
        assert_eq!(store.read().await.unwrap(), fewer);
    }
}
