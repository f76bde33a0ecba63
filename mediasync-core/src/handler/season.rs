//! Season handler.
//!
//! Seasons are identified by `(show title, year, season number)`. When a
//! season arrives for a show the library doesn't know yet, a stub show is
//! synthesised from the season's show-level fields and inserted first, so
//! the season (and later the episodes) have a parent to link to.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::library::MediaLibrary;
use crate::media_type::{MediaType, MediaTypeSet};
use crate::models::{ChangesetType, Import, MediaItem};
use crate::Result;

use super::video::{self, ShowCache};
use super::MediaTypeHandler;

pub struct SeasonImportHandler {
    library: Arc<dyn MediaLibrary>,
    shows: ShowCache,
}

impl SeasonImportHandler {
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            library,
            shows: ShowCache::default(),
        }
    }
}

fn season_number(item: &MediaItem) -> Option<i32> {
    item.video.as_ref().and_then(|v| v.season)
}

fn same_season(a: &MediaItem, b: &MediaItem) -> bool {
    let (Some(a_info), Some(b_info)) = (a.video.as_ref(), b.video.as_ref()) else {
        return false;
    };
    a_info.show_title == b_info.show_title
        && a_info.year == b_info.year
        && a_info.season == b_info.season
}

#[async_trait]
impl MediaTypeHandler for SeasonImportHandler {
    fn media_type(&self) -> MediaType {
        MediaType::Season
    }

    fn dependencies(&self) -> MediaTypeSet {
        [MediaType::TvShow].into_iter().collect()
    }

    /// A season without any episode is meaningless.
    fn required_media_types(&self) -> MediaTypeSet {
        [MediaType::Episode].into_iter().collect()
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
                MediaType::Season,
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
        local_items.iter().position(|local| same_season(local, remote))
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
        self.library.begin(MediaType::Season).await?;
        self.shows
            .warm(&self.library, &import.source.identifier)
            .await
    }

    async fn finish_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.commit(MediaType::Season).await
    }

    async fn abort_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.rollback(MediaType::Season).await
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
                    "synthesised stub show for season"
                );
                let id = stub.library_id.unwrap_or_default();
                self.shows.insert(stub);
                id
            }
        };
        item.video_mut().show_id = Some(show_id);

        // the season may already exist, e.g. created for another import
        let existing = self
            .library
            .all_items(MediaType::Season)
            .await?
            .into_iter()
            .find(|season| {
                season.video.as_ref().and_then(|v| v.show_id) == Some(show_id)
                    && season_number(season) == season_number(item)
            });
        if let Some(existing) = existing {
            item.library_id = existing.library_id;
            return Ok(());
        }

        self.library.insert(item).await?;
        Ok(())
    }

    async fn update_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        self.library.update(item).await
    }

    /// Part of a season might be local or imported from another source, so
    /// nothing is deleted here; the cleanup pass prunes empty seasons.
    async fn remove_imported_item(&mut self, _import: &Import, _item: &MediaItem) -> Result<()> {
        Ok(())
    }

    async fn cleanup_imported_items(&mut self, import: &Import) -> Result<()> {
        let seasons = self.local_items(import).await?;
        if seasons.is_empty() {
            return Ok(());
        }

        let episodes = self.library.all_items(MediaType::Episode).await?;
        for season in seasons {
            let Some(id) = season.library_id else {
                continue;
            };
            let show_id = season.video.as_ref().and_then(|v| v.show_id);
            let number = season_number(&season);
            let has_episodes = episodes.iter().any(|episode| {
                let Some(info) = episode.video.as_ref() else {
                    return false;
                };
                info.show_id == show_id && info.season == number
            });
            if !has_episodes {
                debug!(season = %self.item_label(&season), "removing season without episodes");
                self.library.remove(MediaType::Season, id).await?;
            }
        }
        Ok(())
    }

    async fn remove_imported_items(&mut self, import: &Import) -> Result<()> {
        video::remove_all_imported(&self.library, MediaType::Season, import).await
    }

    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()> {
        self.library
            .set_enabled(
                MediaType::Season,
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

    fn season(show: &str, year: i32, number: i32) -> MediaItem {
        let mut item = MediaItem::new(
            MediaType::Season,
            format!("src://uuid-A/shows/{show}/s{number:02}/"),
            format!("Season {number}"),
        );
        let info = item.video_mut();
        info.show_title = Some(show.to_string());
        info.year = Some(year);
        info.season = Some(number);
        item
    }

    #[tokio::test]
    async fn test_add_synthesises_stub_show() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        let mut handler = SeasonImportHandler::new(library.clone());
        let import = import();

        handler.start_synchronisation(&import).await.unwrap();
        let mut item = season("Show X", 2020, 1);
        handler.add_imported_item(&import, &mut item).await.unwrap();
        handler.finish_synchronisation(&import).await.unwrap();

        let shows = library.all_items(MediaType::TvShow).await.unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].title, "Show X");
        assert_eq!(shows[0].video.as_ref().and_then(|v| v.year), Some(2020));
        assert_eq!(shows[0].path, "src://uuid-A/shows/Show X/");
        assert_eq!(
            item.video.as_ref().and_then(|v| v.show_id),
            shows[0].library_id
        );
    }

    #[tokio::test]
    async fn test_add_reuses_known_show_and_season() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());

        let mut show = MediaItem::new(MediaType::TvShow, "src://uuid-A/shows/Show X/", "Show X");
        show.set_attribution("uuid-A", "src://uuid-A/");
        library.insert(&mut show).await.unwrap();

        let mut handler = SeasonImportHandler::new(library.clone());
        let import = import();
        handler.start_synchronisation(&import).await.unwrap();

        let mut first = season("Show X", 2020, 1);
        handler.add_imported_item(&import, &mut first).await.unwrap();
        assert_eq!(first.video.as_ref().and_then(|v| v.show_id), show.library_id);

        // same season again: no duplicate row
        let mut duplicate = season("Show X", 2020, 1);
        handler
            .add_imported_item(&import, &mut duplicate)
            .await
            .unwrap();
        assert_eq!(duplicate.library_id, first.library_id);
        assert_eq!(library.all_items(MediaType::Season).await.unwrap().len(), 1);
        assert_eq!(library.all_items(MediaType::TvShow).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_seasons_without_episodes() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        let mut handler = SeasonImportHandler::new(library.clone());
        let import = import();

        handler.start_synchronisation(&import).await.unwrap();
        let mut empty = season("Show X", 2020, 1);
        let mut kept = season("Show X", 2020, 2);
        handler.add_imported_item(&import, &mut empty).await.unwrap();
        handler.add_imported_item(&import, &mut kept).await.unwrap();
        handler.finish_synchronisation(&import).await.unwrap();

        let mut episode = MediaItem::new(
            MediaType::Episode,
            "src://uuid-A/shows/Show X/s02/e01",
            "E1",
        );
        {
            let info = episode.video_mut();
            info.show_id = kept.video.as_ref().and_then(|v| v.show_id);
            info.season = Some(2);
        }
        episode.set_attribution("uuid-A", "src://uuid-A/");
        library.insert(&mut episode).await.unwrap();

        handler.cleanup_imported_items(&import).await.unwrap();

        let seasons = library.all_items(MediaType::Season).await.unwrap();
        assert_eq!(seasons.len(), 1);
        assert_eq!(seasons[0].video.as_ref().and_then(|v| v.season), Some(2));
    }
}
