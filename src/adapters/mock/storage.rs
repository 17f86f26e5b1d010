//! In-memory [`UserStore`] with scriptable failures.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::session::UserProfile;
use crate::traits::{StorageError, StoredUser, UserStore};

/// Mock store holding at most one record, with per-operation failure
/// switches and call counters.
#[derive(Default)]
pub struct InMemoryUserStore {
    data: Mutex<Option<StoredUser>>,
    corrupted: AtomicBool,
    read_should_fail: AtomicBool,
    write_should_fail: AtomicBool,
    clear_should_fail: AtomicBool,
    write_calls: AtomicU32,
    clear_calls: AtomicU32,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a record directly, bypassing the trait.
    pub fn seed(&self, record: StoredUser) {
        *self.data.lock().unwrap() = Some(record);
    }

    /// Snapshot of the current record.
    pub fn stored(&self) -> Option<StoredUser> {
        self.data.lock().unwrap().clone()
    }

    /// Make reads report a corrupted record until cleared.
    pub fn set_corrupted(&self, corrupted: bool) {
        self.corrupted.store(corrupted, Ordering::SeqCst);
    }

    pub fn set_read_should_fail(&self, fail: bool) {
        self.read_should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_should_fail(&self, fail: bool) {
        self.write_should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_clear_should_fail(&self, fail: bool) {
        self.clear_should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn write_calls(&self) -> u32 {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> u32 {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user_data(&self) -> Result<Option<StoredUser>, StorageError> {
        if self.corrupted.load(Ordering::SeqCst) {
            return Err(StorageError::Corrupted("unreadable record".into()));
        }
        if self.read_should_fail.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed("simulated read failure".into()));
        }
        Ok(self.data.lock().unwrap().clone())
    }

    async fn store_user_data(
        &self,
        profile: &UserProfile,
        token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StorageError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.write_should_fail.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("simulated write failure".into()));
        }
        *self.data.lock().unwrap() = Some(StoredUser {
            token: token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            profile: profile.clone(),
            last_login: Some(Utc::now()),
            is_complete: true,
        });
        Ok(())
    }

    async fn clear_user_data(&self) -> Result<(), StorageError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        if self.clear_should_fail.load(Ordering::SeqCst) {
            return Err(StorageError::ClearFailed("simulated clear failure".into()));
        }
        *self.data.lock().unwrap() = None;
        // Discarding the record also discards the corruption.
        self.corrupted.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let store = InMemoryUserStore::new();
        store
            .store_user_data(&UserProfile::default(), "tok", Some("r"))
            .await
            .unwrap();

        let record = store.get_user_data().await.unwrap().unwrap();
        assert_eq!(record.token, "tok");
        assert_eq!(store.write_calls(), 1);

        store.clear_user_data().await.unwrap();
        assert_eq!(store.get_user_data().await.unwrap(), None);
        assert_eq!(store.clear_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let store = InMemoryUserStore::new();

        store.set_corrupted(true);
        assert!(matches!(
            store.get_user_data().await,
            Err(StorageError::Corrupted(_))
        ));

        store.set_corrupted(false);
        store.set_read_should_fail(true);
        assert!(matches!(
            store.get_user_data().await,
            Err(StorageError::ReadFailed(_))
        ));

        store.set_write_should_fail(true);
        assert!(store
            .store_user_data(&UserProfile::default(), "t", None)
            .await
            .is_err());

        store.set_clear_should_fail(true);
        assert!(store.clear_user_data().await.is_err());
    }

    #[tokio::test]
    async fn test_clear_discards_corruption() {
        let store = InMemoryUserStore::new();
        store.set_corrupted(true);
        store.clear_user_data().await.unwrap();
        assert!(store.get_user_data().await.unwrap().is_none());
    }
}
