//! Music video handler. Behaves like the movie handler, just against the
//! musicvideo bucket.

use std::sync::Arc;

use async_trait::async_trait;

use crate::library::MediaLibrary;
use crate::media_type::MediaType;
use crate::models::{ChangesetType, Import, MediaItem};
use crate::{Error, Result};

use super::video;
use super::MediaTypeHandler;

pub struct MusicVideoImportHandler {
    library: Arc<dyn MediaLibrary>,
}

impl MusicVideoImportHandler {
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl MediaTypeHandler for MusicVideoImportHandler {
    fn media_type(&self) -> MediaType {
        MediaType::MusicVideo
    }

    fn create(&self) -> Box<dyn MediaTypeHandler> {
        Box::new(Self::new(self.library.clone()))
    }

    async fn local_items(&self, import: &Import) -> Result<Vec<MediaItem>> {
        self.library
            .items(
                MediaType::MusicVideo,
                &import.source.identifier,
                Some(&import.path),
            )
            .await
    }

    fn find_matching_local_item(
        &self,
        _import: &Import,
        remote: &MediaItem,
        local_items: &[MediaItem],
    ) -> Option<usize> {
        video::find_by_path(local_items, &remote.path)
    }

    fn determine_changeset(
        &self,
        import: &Import,
        remote: &MediaItem,
        local: &MediaItem,
    ) -> ChangesetType {
        video::determine_video_changeset(import, remote, local)
    }

    fn prepare_imported_item(&self, import: &Import, remote: &mut MediaItem, local: &MediaItem) {
        video::prepare_video_item(import, remote, local);
    }

    async fn start_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.begin(MediaType::MusicVideo).await
    }

    async fn finish_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.commit(MediaType::MusicVideo).await
    }

    async fn abort_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.rollback(MediaType::MusicVideo).await
    }

    async fn add_imported_item(&mut self, import: &Import, item: &mut MediaItem) -> Result<()> {
        video::attribute_item(import, item);
        self.library.insert(item).await?;
        Ok(())
    }

    async fn update_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        self.library.update(item).await
    }

    async fn remove_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        let id = item
            .library_id
            .ok_or_else(|| Error::InvalidInput("music video has no library id".into()))?;
        self.library.remove(MediaType::MusicVideo, id).await
    }

    async fn cleanup_imported_items(&mut self, _import: &Import) -> Result<()> {
        Ok(())
    }

    async fn remove_imported_items(&mut self, import: &Import) -> Result<()> {
        video::remove_all_imported(&self.library, MediaType::MusicVideo, import).await
    }

    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()> {
        self.library
            .set_enabled(
                MediaType::MusicVideo,
                &import.source.identifier,
                &import.path,
                enabled,
            )
            .await
    }
}
