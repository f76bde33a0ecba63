//! The local media library, as seen by the type handlers.
//!
//! Concrete backends (SQL databases et al.) live outside this crate; the
//! engine only needs the operations below. [`InMemoryMediaLibrary`] is the
//! built-in backend used by the test suites and by embedders that keep the
//! library in process memory.

mod memory;

pub use memory::InMemoryMediaLibrary;

use async_trait::async_trait;

use crate::media_type::MediaType;
use crate::models::MediaItem;
use crate::Result;

/// Storage of the library items themselves.
///
/// Transactions are bracketed per media type: a handler opens one with
/// [`begin`](MediaLibrary::begin), applies its mutations, then either
/// [`commit`](MediaLibrary::commit)s or [`rollback`](MediaLibrary::rollback)s.
/// Implementations must be thread-safe.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn begin(&self, media_type: MediaType) -> Result<()>;
    async fn commit(&self, media_type: MediaType) -> Result<()>;
    async fn rollback(&self, media_type: MediaType) -> Result<()>;

    /// Items of one media type imported from `source_id`, optionally
    /// narrowed to one import path.
    async fn items(
        &self,
        media_type: MediaType,
        source_id: &str,
        import_path: Option<&str>,
    ) -> Result<Vec<MediaItem>>;

    /// Every item of a media type, imported or not.
    async fn all_items(&self, media_type: MediaType) -> Result<Vec<MediaItem>>;

    /// Stores a new item and assigns its library id (also written back into
    /// `item`).
    async fn insert(&self, item: &mut MediaItem) -> Result<u64>;

    /// Replaces the stored item with the same `(media_type, library_id)`.
    async fn update(&self, item: &MediaItem) -> Result<()>;

    async fn remove(&self, media_type: MediaType, library_id: u64) -> Result<()>;

    /// Shows or hides every item attributed to the given import.
    async fn set_enabled(
        &self,
        media_type: MediaType,
        source_id: &str,
        import_path: &str,
        enabled: bool,
    ) -> Result<()>;
}
