//! Retrieval of items from the source, via the importer adapter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::importer::Importer;
use crate::media_type::MediaType;
use crate::models::{ChangesetItem, ChangesetItems, ChangesetType, Import, MediaItem};
use crate::{Error, Result};

use super::{ImportTask, TaskContext, TaskType};

/// The task handed to [`Importer::import`]. It doubles as the sink the
/// adapter deposits retrieved items into, bucketed by media type.
pub struct ImportItemsRetrievalTask {
    import: Import,
    importer: Arc<dyn Importer>,
    local_items: HashMap<MediaType, Vec<MediaItem>>,
    retrieved_items: HashMap<MediaType, ChangesetItems>,
    is_changeset: bool,
    ctx: TaskContext,
}

impl ImportItemsRetrievalTask {
    #[must_use]
    pub fn new(import: Import, importer: Arc<dyn Importer>, ctx: TaskContext) -> Self {
        Self {
            import,
            importer,
            local_items: HashMap::new(),
            retrieved_items: HashMap::new(),
            is_changeset: false,
            ctx,
        }
    }

    #[must_use]
    pub fn media_types(&self) -> &crate::media_type::GroupedMediaTypes {
        &self.import.media_types
    }

    /// The import, mutable so the adapter can refresh source-provided
    /// fields; the processor copies changes back after the task ran.
    pub fn import_mut(&mut self) -> &mut Import {
        &mut self.import
    }

    /// Previously imported items, for adapters that diff on their side.
    #[must_use]
    pub fn local_items(&self, media_type: MediaType) -> &[MediaItem] {
        self.local_items
            .get(&media_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set_local_items(&mut self, items: Vec<MediaItem>, media_type: MediaType) {
        self.local_items.insert(media_type, items);
    }

    /// Adds one retrieved item.
    pub fn add_item(
        &mut self,
        item: MediaItem,
        media_type: MediaType,
        changeset_type: ChangesetType,
    ) {
        self.retrieved_items
            .entry(media_type)
            .or_default()
            .push(ChangesetItem::new(changeset_type, item));
    }

    /// Adds a batch of retrieved items with a common changeset type.
    pub fn add_items(
        &mut self,
        items: Vec<MediaItem>,
        media_type: MediaType,
        changeset_type: ChangesetType,
    ) {
        let bucket = self.retrieved_items.entry(media_type).or_default();
        bucket.extend(
            items
                .into_iter()
                .map(|item| ChangesetItem::new(changeset_type, item)),
        );
    }

    /// Replaces the bucket of one media type with pre-classified items.
    pub fn set_items(&mut self, items: ChangesetItems, media_type: MediaType) {
        self.retrieved_items.insert(media_type, items);
    }

    /// Marks the deposited batch as a pre-computed changeset.
    pub fn set_changeset(&mut self, is_changeset: bool) {
        self.is_changeset = is_changeset;
    }

    #[must_use]
    pub fn is_changeset(&self) -> bool {
        self.is_changeset
    }

    pub fn take_retrieved_items(&mut self, media_type: MediaType) -> ChangesetItems {
        self.retrieved_items.remove(&media_type).unwrap_or_default()
    }

    /// Cancellation poll for the adapter; also publishes progress.
    #[must_use]
    pub fn should_cancel(&self, current: u64, total: u64) -> bool {
        self.ctx.should_cancel(current, total)
    }

    pub fn set_progress_text(&self, text: impl Into<String>) {
        self.ctx.progress().set_text(text);
    }
}

#[async_trait]
impl ImportTask for ImportItemsRetrievalTask {
    fn task_type(&self) -> TaskType {
        TaskType::ImportItemsRetrieval
    }

    fn import(&self) -> &Import {
        &self.import
    }

    async fn run(&mut self) -> Result<()> {
        if self.ctx.should_cancel(0, 0) {
            return Err(Error::Cancelled);
        }
        let importer = self.importer.clone();
        importer.import(self).await
    }
}
