//! JSON-file implementation of [`UserStore`].
//!
//! One record per file. Writes go through a temp file and rename so a crash
//! mid-write leaves either the old record or the new one, never a torn mix.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::session::UserProfile;
use crate::traits::{StorageError, StoredUser, UserStore};

/// Persists the session record as pretty-printed JSON at a fixed path.
#[derive(Debug, Clone)]
pub struct FileUserStore {
    path: PathBuf,
}

impl FileUserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn get_user_data(&self) -> Result<Option<StoredUser>, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::ReadFailed(err.to_string())),
        };

        match serde_json::from_str::<StoredUser>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => Err(StorageError::Corrupted(err.to_string())),
        }
    }

    async fn store_user_data(
        &self,
        profile: &UserProfile,
        token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StorageError> {
        let record = StoredUser {
            token: token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            profile: profile.clone(),
            last_login: Some(Utc::now()),
            is_complete: true,
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|err| StorageError::WriteFailed(err.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::WriteFailed(err.to_string()))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, json.as_bytes())
            .await
            .map_err(|err| StorageError::WriteFailed(err.to_string()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|err| StorageError::WriteFailed(err.to_string()))?;

        debug!(path = %self.path.display(), "session record written");
        Ok(())
    }

    async fn clear_user_data(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::ClearFailed(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileUserStore {
        FileUserStore::new(dir.path().join("session.json"))
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get_user_data().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let profile = UserProfile {
            name: Some("Dana".into()),
            email: Some("owner@example.com".into()),
            permissions: vec!["tickets.write".into()],
            ..Default::default()
        };
        store
            .store_user_data(&profile, "tok", Some("refresh"))
            .await
            .unwrap();

        let record = store.get_user_data().await.unwrap().unwrap();
        assert_eq!(record.token, "tok");
        assert_eq!(record.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(record.profile, profile);
        assert!(record.is_complete);
        assert!(record.last_login.is_some());
    }

    #[tokio::test]
    async fn test_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUserStore::new(dir.path().join("nested/deep/session.json"));

        store
            .store_user_data(&UserProfile::default(), "tok", None)
            .await
            .unwrap();
        assert!(store.get_user_data().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_file_is_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), b"{not json").await.unwrap();

        let err = store.get_user_data().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_clear_removes_record_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .store_user_data(&UserProfile::default(), "tok", None)
            .await
            .unwrap();
        store.clear_user_data().await.unwrap();
        assert_eq!(store.get_user_data().await.unwrap(), None);

        // Clearing an already-empty store is not an error.
        store.clear_user_data().await.unwrap();
    }

    #[tokio::test]
    async fn test_store_replaces_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .store_user_data(&UserProfile::default(), "old", None)
            .await
            .unwrap();
        store
            .store_user_data(&UserProfile::default(), "new", Some("r"))
            .await
            .unwrap();

        let record = store.get_user_data().await.unwrap().unwrap();
        assert_eq!(record.token, "new");
    }
}
