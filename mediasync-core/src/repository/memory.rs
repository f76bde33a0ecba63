//! In-memory repository.
//!
//! Keeps sources and imports in process memory. Used by the test suites and
//! by deployments that don't need imports to survive a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::media_type::{GroupedMediaTypes, MediaTypeSet};
use crate::models::{Import, ImportKey, Source};
use crate::paths::is_within_base;
use crate::{Error, Result};

use super::ImportRepository;

#[derive(Default)]
struct Store {
    sources: HashMap<String, Source>,
    imports: HashMap<ImportKey, Import>,
}

/// Thread-safe in-memory [`ImportRepository`].
#[derive(Default)]
pub struct InMemoryImportRepository {
    store: RwLock<Store>,
}

impl InMemoryImportRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strips runtime-only state before persisting.
    fn persisted(source: &Source) -> Source {
        let mut stored = source.clone_deep();
        stored.active = false;
        stored.ready = false;
        stored
    }
}

#[async_trait]
impl ImportRepository for InMemoryImportRepository {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn sources_for_media_types(&self, media_types: &MediaTypeSet) -> Result<Vec<Source>> {
        let store = self.store.read();
        let mut sources: Vec<Source> = store
            .sources
            .values()
            .filter(|source| {
                media_types
                    .iter()
                    .all(|mt| source.available_media_types.contains(mt))
            })
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(sources)
    }

    async fn source(&self, identifier: &str) -> Result<Option<Source>> {
        Ok(self.store.read().sources.get(identifier).cloned())
    }

    async fn add_source(&self, source: &Source) -> Result<bool> {
        if source.identifier.is_empty() {
            return Err(Error::InvalidInput("source identifier is empty".into()));
        }

        let mut store = self.store.write();
        match store.sources.get(&source.identifier) {
            Some(existing) if existing.same_persisted_state(source) => Ok(false),
            _ => {
                store
                    .sources
                    .insert(source.identifier.clone(), Self::persisted(source));
                Ok(true)
            }
        }
    }

    async fn update_source(&self, source: &Source) -> Result<bool> {
        let mut store = self.store.write();
        match store.sources.get(&source.identifier) {
            None => Err(Error::NotFound(format!(
                "source '{}'",
                source.identifier
            ))),
            Some(existing) if existing.same_persisted_state(source) => Ok(false),
            Some(_) => {
                store
                    .sources
                    .insert(source.identifier.clone(), Self::persisted(source));
                Ok(true)
            }
        }
    }

    async fn remove_source(&self, identifier: &str) -> Result<()> {
        let mut store = self.store.write();
        store.sources.remove(identifier);
        store
            .imports
            .retain(|_, import| import.source.identifier != identifier);
        Ok(())
    }

    async fn imports(&self) -> Result<Vec<Import>> {
        let mut imports: Vec<Import> = self.store.read().imports.values().cloned().collect();
        imports.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(imports)
    }

    async fn imports_by_source(&self, identifier: &str) -> Result<Vec<Import>> {
        let mut imports: Vec<Import> = self
            .store
            .read()
            .imports
            .values()
            .filter(|import| import.source.identifier == identifier)
            .cloned()
            .collect();
        imports.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(imports)
    }

    async fn imports_by_media_types(
        &self,
        media_types: &GroupedMediaTypes,
    ) -> Result<Vec<Import>> {
        let mut imports: Vec<Import> = self
            .store
            .read()
            .imports
            .values()
            .filter(|import| import.media_types == *media_types)
            .cloned()
            .collect();
        imports.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(imports)
    }

    async fn imports_by_path(
        &self,
        path: &str,
        include_subdirectories: bool,
    ) -> Result<Vec<Import>> {
        let mut imports: Vec<Import> = self
            .store
            .read()
            .imports
            .values()
            .filter(|import| {
                if include_subdirectories {
                    is_within_base(path, &import.path)
                } else {
                    import.path == path
                }
            })
            .cloned()
            .collect();
        imports.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(imports)
    }

    async fn import(
        &self,
        path: &str,
        media_types: &GroupedMediaTypes,
    ) -> Result<Option<Import>> {
        let key = (path.to_string(), media_types.clone());
        Ok(self.store.read().imports.get(&key).cloned())
    }

    async fn add_import(&self, import: &Import) -> Result<bool> {
        if import.path.is_empty() {
            return Err(Error::InvalidInput("import path is empty".into()));
        }
        if import.media_types.is_empty() {
            return Err(Error::InvalidInput("import has no media types".into()));
        }

        let mut store = self.store.write();
        if !store.sources.contains_key(&import.source.identifier) {
            return Err(Error::NotFound(format!(
                "source '{}'",
                import.source.identifier
            )));
        }

        match store.imports.get(&import.key()) {
            Some(existing) if existing.same_persisted_state(import) => Ok(false),
            _ => {
                store.imports.insert(import.key(), import.clone_deep());
                Ok(true)
            }
        }
    }

    async fn update_import(&self, import: &Import) -> Result<bool> {
        let mut store = self.store.write();
        match store.imports.get(&import.key()) {
            None => Err(Error::NotFound(format!("import '{}'", import.path))),
            Some(existing) if existing.same_persisted_state(import) => Ok(false),
            Some(_) => {
                store.imports.insert(import.key(), import.clone_deep());
                Ok(true)
            }
        }
    }

    async fn remove_import(&self, import: &Import) -> Result<()> {
        self.store.write().imports.remove(&import.key());
        Ok(())
    }

    async fn update_last_sync(&self, import: &Import, when: DateTime<Utc>) -> Result<()> {
        let mut store = self.store.write();
        let Some(stored) = store.imports.get_mut(&import.key()) else {
            return Err(Error::NotFound(format!("import '{}'", import.path)));
        };
        stored.mark_synced(when);

        let source_id = stored.source.identifier.clone();
        if let Some(source) = store.sources.get_mut(&source_id) {
            if Some(when) > source.last_synced {
                source.last_synced = Some(when);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_type::MediaType;
    use chrono::TimeZone;

    fn source() -> Source {
        let mut source = Source::new("uuid-A", "src://uuid-A/");
        source.available_media_types = [MediaType::Movie, MediaType::Episode]
            .into_iter()
            .collect();
        source
    }

    fn movie_import(source: &Source) -> Import {
        Import::recursive(
            "src://uuid-A/movies/",
            GroupedMediaTypes::new(vec![MediaType::Movie]),
            source.clone(),
        )
    }

    #[tokio::test]
    async fn test_add_source_is_idempotent() {
        let repo = InMemoryImportRepository::new();
        assert!(repo.add_source(&source()).await.unwrap());
        assert!(!repo.add_source(&source()).await.unwrap());
        assert_eq!(repo.sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_source_strips_transient_flags() {
        let repo = InMemoryImportRepository::new();
        let mut active = source();
        active.active = true;
        active.ready = true;
        repo.add_source(&active).await.unwrap();

        let stored = repo.source("uuid-A").await.unwrap().unwrap();
        assert!(!stored.active);
        assert!(!stored.ready);
    }

    #[tokio::test]
    async fn test_add_source_rejects_empty_identifier() {
        let repo = InMemoryImportRepository::new();
        assert!(repo.add_source(&Source::new("", "src://x/")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_source_detects_change() {
        let repo = InMemoryImportRepository::new();
        repo.add_source(&source()).await.unwrap();

        let mut renamed = source();
        renamed.friendly_name = "Renamed".to_string();
        assert!(repo.update_source(&renamed).await.unwrap());
        assert!(!repo.update_source(&renamed).await.unwrap());

        let unknown = Source::new("uuid-B", "src://uuid-B/");
        assert!(matches!(
            repo.update_source(&unknown).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_import_requires_source() {
        let repo = InMemoryImportRepository::new();
        let import = movie_import(&source());
        assert!(matches!(
            repo.add_import(&import).await,
            Err(Error::NotFound(_))
        ));

        repo.add_source(&source()).await.unwrap();
        assert!(repo.add_import(&import).await.unwrap());
        assert!(!repo.add_import(&import).await.unwrap());
    }

    #[tokio::test]
    async fn test_imports_by_path() {
        let repo = InMemoryImportRepository::new();
        repo.add_source(&source()).await.unwrap();

        let movies = movie_import(&source());
        let episodes = Import::recursive(
            "src://uuid-A/shows/showx/",
            GroupedMediaTypes::new(vec![MediaType::TvShow, MediaType::Season, MediaType::Episode]),
            source(),
        );
        repo.add_import(&movies).await.unwrap();
        repo.add_import(&episodes).await.unwrap();

        let exact = repo
            .imports_by_path("src://uuid-A/movies/", false)
            .await
            .unwrap();
        assert_eq!(exact.len(), 1);

        let subtree = repo.imports_by_path("src://uuid-A/", true).await.unwrap();
        assert_eq!(subtree.len(), 2);

        let none = repo
            .imports_by_path("src://uuid-A/shows/", false)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_remove_source_cascades_to_imports() {
        let repo = InMemoryImportRepository::new();
        repo.add_source(&source()).await.unwrap();
        repo.add_import(&movie_import(&source())).await.unwrap();

        repo.remove_source("uuid-A").await.unwrap();
        assert!(repo.source("uuid-A").await.unwrap().is_none());
        assert!(repo.imports().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_last_sync_touches_source() {
        let repo = InMemoryImportRepository::new();
        repo.add_source(&source()).await.unwrap();
        let import = movie_import(&source());
        repo.add_import(&import).await.unwrap();

        let when = Utc.with_ymd_and_hms(2025, 5, 1, 8, 30, 0).unwrap();
        repo.update_last_sync(&import, when).await.unwrap();

        let stored_import = repo
            .import(&import.path, &import.media_types)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored_import.last_synced, Some(when));
        let stored_source = repo.source("uuid-A").await.unwrap().unwrap();
        assert_eq!(stored_source.last_synced, Some(when));
    }

    #[tokio::test]
    async fn test_sources_for_media_types() {
        let repo = InMemoryImportRepository::new();
        repo.add_source(&source()).await.unwrap();
        let mut music = Source::new("uuid-B", "src://uuid-B/");
        music.available_media_types = [MediaType::Artist, MediaType::Album, MediaType::Song]
            .into_iter()
            .collect();
        repo.add_source(&music).await.unwrap();

        let movie_sources = repo
            .sources_for_media_types(&[MediaType::Movie].into_iter().collect())
            .await
            .unwrap();
        assert_eq!(movie_sources.len(), 1);
        assert_eq!(movie_sources[0].identifier, "uuid-A");

        let all = repo.sources().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
