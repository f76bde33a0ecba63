//! TV show handler.
//!
//! Shows are containers: a show row may be referenced by seasons and
//! episodes from several imports, so shows are never deleted item-by-item
//! during synchronisation. Orphaned shows are pruned by the cleanup pass,
//! which runs after episodes and seasons have been cleaned up.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::library::MediaLibrary;
use crate::media_type::MediaType;
use crate::models::{ChangesetType, Import, MediaItem};
use crate::Result;

use super::video;
use super::MediaTypeHandler;

pub struct TvShowImportHandler {
    library: Arc<dyn MediaLibrary>,
}

impl TvShowImportHandler {
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self { library }
    }

    async fn is_show_referenced(&self, show_id: u64) -> Result<bool> {
        for media_type in [MediaType::Season, MediaType::Episode] {
            let children = self.library.all_items(media_type).await?;
            if children
                .iter()
                .any(|child| child.video.as_ref().and_then(|v| v.show_id) == Some(show_id))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl MediaTypeHandler for TvShowImportHandler {
    fn media_type(&self) -> MediaType {
        MediaType::TvShow
    }

    fn grouped_media_types(&self) -> Vec<MediaType> {
        vec![MediaType::TvShow, MediaType::Season, MediaType::Episode]
    }

    fn create(&self) -> Box<dyn MediaTypeHandler> {
        Box::new(Self::new(self.library.clone()))
    }

    async fn local_items(&self, import: &Import) -> Result<Vec<MediaItem>> {
        self.library
            .items(
                MediaType::TvShow,
                &import.source.identifier,
                Some(&import.path),
            )
            .await
    }

    /// Shows are identified by title and year; the source path is only a
    /// fallback because synthesised stub shows carry a derived path.
    fn find_matching_local_item(
        &self,
        _import: &Import,
        remote: &MediaItem,
        local_items: &[MediaItem],
    ) -> Option<usize> {
        let remote_year = remote.video.as_ref().and_then(|v| v.year);
        local_items
            .iter()
            .position(|local| {
                local.title == remote.title
                    && local.video.as_ref().and_then(|v| v.year) == remote_year
            })
            .or_else(|| video::find_by_path(local_items, &remote.path))
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
        self.library.begin(MediaType::TvShow).await
    }

    async fn finish_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.commit(MediaType::TvShow).await
    }

    async fn abort_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.rollback(MediaType::TvShow).await
    }

    async fn add_imported_item(&mut self, import: &Import, item: &mut MediaItem) -> Result<()> {
        video::attribute_item(import, item);
        self.library.insert(item).await?;
        Ok(())
    }

    async fn update_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        self.library.update(item).await
    }

    /// Part of a show may be local or belong to another import, so nothing
    /// is deleted here; the cleanup pass prunes shows nobody references.
    async fn remove_imported_item(&mut self, _import: &Import, _item: &MediaItem) -> Result<()> {
        Ok(())
    }

    async fn cleanup_imported_items(&mut self, import: &Import) -> Result<()> {
        let shows = self.local_items(import).await?;
        for show in shows {
            let Some(id) = show.library_id else {
                continue;
            };
            if !self.is_show_referenced(id).await? {
                debug!(show = %show.title, "removing show without remaining seasons or episodes");
                self.library.remove(MediaType::TvShow, id).await?;
            }
        }
        Ok(())
    }

    async fn remove_imported_items(&mut self, import: &Import) -> Result<()> {
        video::remove_all_imported(&self.library, MediaType::TvShow, import).await
    }

    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()> {
        self.library
            .set_enabled(
                MediaType::TvShow,
                &import.source.identifier,
                &import.path,
                enabled,
            )
            .await
    }
}
