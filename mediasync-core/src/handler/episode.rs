//! Episode handler.
//!
//! Episodes are identified by their source path. The parent show is
//! resolved by title, falling back to a path-prefix check when several
//! shows share the title.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::library::MediaLibrary;
use crate::media_type::{MediaType, MediaTypeSet};
use crate::models::{ChangesetType, Import, MediaItem};
use crate::{Error, Result};

use super::video::{self, ShowCache};
use super::MediaTypeHandler;

pub struct EpisodeImportHandler {
    library: Arc<dyn MediaLibrary>,
    shows: ShowCache,
}

impl EpisodeImportHandler {
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            library,
            shows: ShowCache::default(),
        }
    }
}

#[async_trait]
impl MediaTypeHandler for EpisodeImportHandler {
    fn media_type(&self) -> MediaType {
        MediaType::Episode
    }

    fn dependencies(&self) -> MediaTypeSet {
        [MediaType::TvShow, MediaType::Season].into_iter().collect()
    }

    fn grouped_media_types(&self) -> Vec<MediaType> {
        vec![MediaType::TvShow, MediaType::Season, MediaType::Episode]
    }

    fn create(&self) -> Box<dyn MediaTypeHandler> {
        Box::new(Self::new(self.library.clone()))
    }

    fn item_label(&self, item: &MediaItem) -> String {
        match item.video.as_ref().and_then(|v| v.show_title.as_deref()) {
            Some(show) => format!("{show} - {}", item.title),
            None => item.title.clone(),
        }
    }

    async fn local_items(&self, import: &Import) -> Result<Vec<MediaItem>> {
        self.library
            .items(
                MediaType::Episode,
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

    async fn start_synchronisation(&mut self, import: &Import) -> Result<()> {
        self.library.begin(MediaType::Episode).await?;
        self.shows
            .warm(&self.library, &import.source.identifier)
            .await
    }

    async fn finish_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.commit(MediaType::Episode).await
    }

    async fn abort_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.rollback(MediaType::Episode).await
    }

    async fn add_imported_item(&mut self, import: &Import, item: &mut MediaItem) -> Result<()> {
        video::attribute_item(import, item);

        let show_id = match self.shows.find_show_id(item) {
            Some(id) => id,
            None => {
                let stub = video::synthesise_stub_show(&self.library, import, item).await?;
                debug!(
                    show = %stub.title,
                    show_id = ?stub.library_id,
                    "synthesised stub show for episode"
                );
                let id = stub.library_id.unwrap_or_default();
                self.shows.insert(stub);
                id
            }
        };
        item.video_mut().show_id = Some(show_id);

        self.library.insert(item).await?;
        Ok(())
    }

    async fn update_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        self.library.update(item).await
    }

    async fn remove_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        let id = item
            .library_id
            .ok_or_else(|| Error::InvalidInput("episode has no library id".into()))?;
        self.library.remove(MediaType::Episode, id).await
    }

    async fn cleanup_imported_items(&mut self, _import: &Import) -> Result<()> {
        Ok(())
    }

    async fn remove_imported_items(&mut self, import: &Import) -> Result<()> {
        video::remove_all_imported(&self.library, MediaType::Episode, import).await
    }

    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()> {
        self.library
            .set_enabled(
                MediaType::Episode,
                &import.source.identifier,
                &import.path,
                enabled,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::InMemoryMediaLibrary;
    use crate::media_type::GroupedMediaTypes;
    use crate::models::Source;

    fn import() -> Import {
        Import::recursive(
            "src://uuid-A/",
            GroupedMediaTypes::new(vec![MediaType::TvShow, MediaType::Season, MediaType::Episode]),
            Source::new("uuid-A", "src://uuid-A/"),
        )
    }

    fn episode(show: &str, path: &str) -> MediaItem {
        let mut item = MediaItem::new(MediaType::Episode, path, "Pilot");
        let info = item.video_mut();
        info.show_title = Some(show.to_string());
        info.season = Some(1);
        info.episode = Some(1);
        item
    }

    #[tokio::test]
    async fn test_show_resolution_prefers_path_prefix() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());

        // two shows with the same title, different paths
        for path in ["src://uuid-A/shows/Show X (2019)/", "src://uuid-A/shows/Show X (2020)/"] {
            let mut show = MediaItem::new(MediaType::TvShow, path, "Show X");
            show.set_attribution("uuid-A", "src://uuid-A/");
            library.insert(&mut show).await.unwrap();
        }

        let mut handler = EpisodeImportHandler::new(library.clone());
        let import = import();
        handler.start_synchronisation(&import).await.unwrap();

        let mut item = episode("Show X", "src://uuid-A/shows/Show X (2020)/s01/e01");
        handler.add_imported_item(&import, &mut item).await.unwrap();

        let shows = library.all_items(MediaType::TvShow).await.unwrap();
        let expected = shows
            .iter()
            .find(|s| s.path.contains("(2020)"))
            .and_then(|s| s.library_id);
        assert_eq!(item.video.as_ref().and_then(|v| v.show_id), expected);
        // no stub was synthesised
        assert_eq!(shows.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_show_gets_stub() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        let mut handler = EpisodeImportHandler::new(library.clone());
        let import = import();
        handler.start_synchronisation(&import).await.unwrap();

        let mut item = episode("Fresh Show", "src://uuid-A/shows/Fresh Show/s01/e01");
        handler.add_imported_item(&import, &mut item).await.unwrap();

        let shows = library.all_items(MediaType::TvShow).await.unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].title, "Fresh Show");
        assert_eq!(
            item.video.as_ref().and_then(|v| v.show_id),
            shows[0].library_id
        );
    }
}
