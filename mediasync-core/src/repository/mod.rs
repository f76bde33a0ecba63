//! Durable storage of sources and imports.
//!
//! The engine never talks to a concrete database; it goes through this
//! trait. Several repositories can be registered at once, in which case the
//! manager merges their views (see [`crate::models::Source::merge`]).

mod memory;

pub use memory::InMemoryImportRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::media_type::{GroupedMediaTypes, MediaTypeSet};
use crate::models::{Import, Source};
use crate::Result;

/// Store of sources and imports (not of the imported items themselves).
///
/// Mutating operations are upserts with change detection: `Ok(true)` means
/// the stored state changed, `Ok(false)` means the entity was already
/// present with identical state, `Err` is a hard failure. Implementations
/// must be thread-safe and wrap multi-step updates in transactions.
#[async_trait]
pub trait ImportRepository: Send + Sync {
    /// Opens the underlying store. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// All stored sources.
    async fn sources(&self) -> Result<Vec<Source>> {
        self.sources_for_media_types(&MediaTypeSet::new()).await
    }

    /// Sources that offer every media type in `media_types` (all sources
    /// when the set is empty).
    async fn sources_for_media_types(&self, media_types: &MediaTypeSet) -> Result<Vec<Source>>;

    async fn source(&self, identifier: &str) -> Result<Option<Source>>;

    async fn add_source(&self, source: &Source) -> Result<bool>;

    /// Fails with [`crate::Error::NotFound`] for unknown sources.
    async fn update_source(&self, source: &Source) -> Result<bool>;

    /// Removes a source and, transactionally, all of its imports. Unknown
    /// identifiers are a no-op.
    async fn remove_source(&self, identifier: &str) -> Result<()>;

    async fn imports(&self) -> Result<Vec<Import>>;

    async fn imports_by_source(&self, identifier: &str) -> Result<Vec<Import>>;

    async fn imports_by_media_types(
        &self,
        media_types: &GroupedMediaTypes,
    ) -> Result<Vec<Import>>;

    /// Imports registered exactly at `path`, or — with
    /// `include_subdirectories` — anywhere below it.
    async fn imports_by_path(
        &self,
        path: &str,
        include_subdirectories: bool,
    ) -> Result<Vec<Import>>;

    async fn import(
        &self,
        path: &str,
        media_types: &GroupedMediaTypes,
    ) -> Result<Option<Import>>;

    /// Fails with [`crate::Error::NotFound`] when the owning source is not
    /// stored.
    async fn add_import(&self, import: &Import) -> Result<bool>;

    /// Fails with [`crate::Error::NotFound`] for unknown imports.
    async fn update_import(&self, import: &Import) -> Result<bool>;

    /// Unknown imports are a no-op.
    async fn remove_import(&self, import: &Import) -> Result<()>;

    /// Stamps the stored import and its source with a synchronisation time.
    async fn update_last_sync(&self, import: &Import, when: DateTime<Utc>) -> Result<()>;
}
