//! Per-media-type library handlers.
//!
//! A handler knows how to read and write one media type of the local
//! library: enumerate imported items, match retrieved items against them,
//! decide whether something changed, and apply additions, updates and
//! removals inside a transaction.

mod album;
mod artist;
mod episode;
mod movie;
pub(crate) mod music;
mod musicvideo;
mod season;
mod song;
mod tvshow;
pub(crate) mod video;

pub use album::AlbumImportHandler;
pub use artist::ArtistImportHandler;
pub use episode::EpisodeImportHandler;
pub use movie::MovieImportHandler;
pub use musicvideo::MusicVideoImportHandler;
pub use season::SeasonImportHandler;
pub use song::SongImportHandler;
pub use tvshow::TvShowImportHandler;

use std::sync::Arc;

use async_trait::async_trait;

use crate::media_type::{MediaType, MediaTypeSet};
use crate::models::{ChangesetType, Import, MediaItem};
use crate::Result;

/// Library-side operations for one media type.
///
/// Handler instances used inside a pipeline are created per job through
/// [`create`](MediaTypeHandler::create) so per-instance caches (such as the
/// season handler's show map) are never shared across jobs. Registered
/// prototypes are only used as factories.
#[async_trait]
pub trait MediaTypeHandler: Send + Sync {
    fn media_type(&self) -> MediaType;

    /// Media types that must be handled before this one.
    fn dependencies(&self) -> MediaTypeSet {
        MediaTypeSet::new()
    }

    /// Media types that must be importable for this one to be meaningful.
    fn required_media_types(&self) -> MediaTypeSet {
        MediaTypeSet::new()
    }

    /// The ordered group this media type belongs to (empty for standalone
    /// types).
    fn grouped_media_types(&self) -> Vec<MediaType> {
        Vec::new()
    }

    /// Fresh, exclusively owned instance for one pipeline job.
    fn create(&self) -> Box<dyn MediaTypeHandler>;

    /// Human-readable label of an item, for progress and log output.
    fn item_label(&self, item: &MediaItem) -> String {
        item.title.clone()
    }

    /// Items currently attributed to the given import.
    async fn local_items(&self, import: &Import) -> Result<Vec<MediaItem>>;

    /// Brackets a matching pass; a chance to warm per-instance caches.
    async fn start_changeset(&mut self, _import: &Import) -> Result<()> {
        Ok(())
    }

    async fn finish_changeset(&mut self, _import: &Import) -> Result<()> {
        Ok(())
    }

    /// Identity function in library space: the local item the retrieved one
    /// corresponds to, as an index into `local_items`.
    fn find_matching_local_item(
        &self,
        import: &Import,
        remote: &MediaItem,
        local_items: &[MediaItem],
    ) -> Option<usize>;

    /// Compares all fields relevant under the import's settings.
    fn determine_changeset(
        &self,
        import: &Import,
        remote: &MediaItem,
        local: &MediaItem,
    ) -> ChangesetType;

    /// Copies identity and parent linkage from `local` into `remote` so the
    /// retrieved item can be written over the stored one.
    fn prepare_imported_item(&self, import: &Import, remote: &mut MediaItem, local: &MediaItem);

    /// Opens the persistence transaction for a synchronisation pass.
    async fn start_synchronisation(&mut self, import: &Import) -> Result<()>;

    /// Commits the transaction.
    async fn finish_synchronisation(&mut self, import: &Import) -> Result<()>;

    /// Rolls the transaction back after a failure or cancellation.
    async fn abort_synchronisation(&mut self, import: &Import) -> Result<()>;

    async fn add_imported_item(&mut self, import: &Import, item: &mut MediaItem) -> Result<()>;

    async fn update_imported_item(&mut self, import: &Import, item: &MediaItem) -> Result<()>;

    async fn remove_imported_item(&mut self, import: &Import, item: &MediaItem) -> Result<()>;

    /// Prunes orphans after a synchronisation pass.
    async fn cleanup_imported_items(&mut self, import: &Import) -> Result<()>;

    /// Bulk-deletes everything attributed to the import.
    async fn remove_imported_items(&mut self, import: &Import) -> Result<()>;

    /// Shows or hides the import's items, e.g. while the source is inactive.
    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()>;
}

/// Resolves the handler prototype registered for a media type.
pub trait HandlerResolver: Send + Sync {
    fn handler_for(&self, media_type: MediaType) -> Option<Arc<dyn MediaTypeHandler>>;
}

/// Builds `(dependent, required)` ordering edges from the handlers' grouped
/// media type lists: inside a group, everything left of a type precedes it.
#[must_use]
pub fn grouped_order_edges(
    handlers: &[Arc<dyn MediaTypeHandler>],
) -> Vec<(MediaType, MediaType)> {
    let mut edges = Vec::new();
    for handler in handlers {
        for media_type in handler.grouped_media_types() {
            if media_type == handler.media_type() {
                break;
            }
            edges.push((handler.media_type(), media_type));
        }
    }
    edges
}
