//! In-memory media library backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::media_type::MediaType;
use crate::models::MediaItem;
use crate::{Error, Result};

use super::MediaLibrary;

/// Thread-safe in-memory [`MediaLibrary`] with snapshot-rollback
/// transactions per media type.
#[derive(Default)]
pub struct InMemoryMediaLibrary {
    items: RwLock<HashMap<MediaType, Vec<MediaItem>>>,
    snapshots: Mutex<HashMap<MediaType, Vec<MediaItem>>>,
    next_id: AtomicU64,
}

impl InMemoryMediaLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl MediaLibrary for InMemoryMediaLibrary {
    async fn begin(&self, media_type: MediaType) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        if snapshots.contains_key(&media_type) {
            return Err(Error::Persistence(format!(
                "transaction for {media_type} already open"
            )));
        }
        let current = self
            .items
            .read()
            .get(&media_type)
            .cloned()
            .unwrap_or_default();
        snapshots.insert(media_type, current);
        Ok(())
    }

    async fn commit(&self, media_type: MediaType) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        if snapshots.remove(&media_type).is_none() {
            return Err(Error::Persistence(format!(
                "no open transaction for {media_type}"
            )));
        }
        Ok(())
    }

    async fn rollback(&self, media_type: MediaType) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        let Some(snapshot) = snapshots.remove(&media_type) else {
            return Err(Error::Persistence(format!(
                "no open transaction for {media_type}"
            )));
        };
        self.items.write().insert(media_type, snapshot);
        Ok(())
    }

    async fn items(
        &self,
        media_type: MediaType,
        source_id: &str,
        import_path: Option<&str>,
    ) -> Result<Vec<MediaItem>> {
        let items = self.items.read();
        Ok(items
            .get(&media_type)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|item| item.source_id == source_id)
                    .filter(|item| import_path.is_none_or(|path| item.import_path == path))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_items(&self, media_type: MediaType) -> Result<Vec<MediaItem>> {
        Ok(self
            .items
            .read()
            .get(&media_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert(&self, item: &mut MediaItem) -> Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        item.library_id = Some(id);
        self.items
            .write()
            .entry(item.media_type)
            .or_default()
            .push(item.clone());
        Ok(id)
    }

    async fn update(&self, item: &MediaItem) -> Result<()> {
        let Some(id) = item.library_id else {
            return Err(Error::Persistence(
                "cannot update an item without a library id".to_string(),
            ));
        };
        let mut items = self.items.write();
        let bucket = items.entry(item.media_type).or_default();
        match bucket.iter_mut().find(|stored| stored.library_id == Some(id)) {
            Some(stored) => {
                *stored = item.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "{} item {id}",
                item.media_type
            ))),
        }
    }

    async fn remove(&self, media_type: MediaType, library_id: u64) -> Result<()> {
        let mut items = self.items.write();
        if let Some(bucket) = items.get_mut(&media_type) {
            bucket.retain(|item| item.library_id != Some(library_id));
        }
        Ok(())
    }

    async fn set_enabled(
        &self,
        media_type: MediaType,
        source_id: &str,
        import_path: &str,
        enabled: bool,
    ) -> Result<()> {
        let mut items = self.items.write();
        if let Some(bucket) = items.get_mut(&media_type) {
            for item in bucket
                .iter_mut()
                .filter(|item| item.source_id == source_id && item.import_path == import_path)
            {
                item.enabled = enabled;
            }
        }
        Ok(())
    }
}
