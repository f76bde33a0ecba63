//! Album handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::library::MediaLibrary;
use crate::media_type::{MediaType, MediaTypeSet};
use crate::models::{ChangesetType, Import, MediaItem};
use crate::Result;

use super::music;
use super::MediaTypeHandler;

pub struct AlbumImportHandler {
    library: Arc<dyn MediaLibrary>,
}

impl AlbumImportHandler {
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl MediaTypeHandler for AlbumImportHandler {
    fn media_type(&self) -> MediaType {
        MediaType::Album
    }

    fn dependencies(&self) -> MediaTypeSet {
        [MediaType::Artist].into_iter().collect()
    }

    fn grouped_media_types(&self) -> Vec<MediaType> {
        vec![MediaType::Artist, MediaType::Album, MediaType::Song]
    }

    fn create(&self) -> Box<dyn MediaTypeHandler> {
        Box::new(Self::new(self.library.clone()))
    }

    fn item_label(&self, item: &MediaItem) -> String {
        let artists = item
            .music
            .as_ref()
            .map(|m| m.album_artists.join(", "))
            .unwrap_or_default();
        if artists.is_empty() {
            item.title.clone()
        } else {
            format!("{artists} - {}", item.title)
        }
    }

    async fn local_items(&self, import: &Import) -> Result<Vec<MediaItem>> {
        self.library
            .items(
                MediaType::Album,
                &import.source.identifier,
                Some(&import.path),
            )
            .await
    }

    /// Albums are identified by their MusicBrainz id when both sides have
    /// one, otherwise by title plus album artists.
    fn find_matching_local_item(
        &self,
        _import: &Import,
        remote: &MediaItem,
        local_items: &[MediaItem],
    ) -> Option<usize> {
        let remote_info = remote.music.as_ref();
        let remote_mbid = remote_info.and_then(|m| m.musicbrainz_album_id.as_deref());
        if let Some(mbid) = remote_mbid {
            if let Some(index) = local_items.iter().position(|local| {
                local
                    .music
                    .as_ref()
                    .and_then(|m| m.musicbrainz_album_id.as_deref())
                    == Some(mbid)
            }) {
                return Some(index);
            }
        }

        let remote_artists = remote_info
            .map(|m| m.album_artists.as_slice())
            .unwrap_or_default();
        local_items.iter().position(|local| {
            local.title == remote.title
                && local
                    .music
                    .as_ref()
                    .map(|m| m.album_artists.as_slice())
                    .unwrap_or_default()
                    == remote_artists
        })
    }

    fn determine_changeset(
        &self,
        import: &Import,
        remote: &MediaItem,
        local: &MediaItem,
    ) -> ChangesetType {
        music::determine_music_changeset(import, remote, local)
    }

    fn prepare_imported_item(&self, import: &Import, remote: &mut MediaItem, local: &MediaItem) {
        music::prepare_music_item(import, remote, local);
    }

    async fn start_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.begin(MediaType::Album).await
    }

    async fn finish_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.commit(MediaType::Album).await
    }

    async fn abort_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.rollback(MediaType::Album).await
    }

    async fn add_imported_item(&mut self, import: &Import, item: &mut MediaItem) -> Result<()> {
        music::attribute_item(import, item);
        self.library.insert(item).await?;
        Ok(())
    }

    async fn update_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        self.library.update(item).await
    }

    /// Albums may hold songs from other imports; pruning happens in the
    /// cleanup pass.
    async fn remove_imported_item(&mut self, _import: &Import, _item: &MediaItem) -> Result<()> {
        Ok(())
    }

    async fn cleanup_imported_items(&mut self, import: &Import) -> Result<()> {
        let albums = self.local_items(import).await?;
        if albums.is_empty() {
            return Ok(());
        }

        let songs = self.library.all_items(MediaType::Song).await?;
        for album in albums {
            let Some(id) = album.library_id else {
                continue;
            };
            let has_songs = songs.iter().any(|song| {
                song.music.as_ref().and_then(|m| m.album_id) == Some(id)
            });
            if !has_songs {
                debug!(album = %self.item_label(&album), "removing album without songs");
                self.library.remove(MediaType::Album, id).await?;
            }
        }
        Ok(())
    }

    async fn remove_imported_items(&mut self, import: &Import) -> Result<()> {
        music::remove_all_imported(&self.library, MediaType::Album, import).await
    }

    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()> {
        self.library
            .set_enabled(
                MediaType::Album,
                &import.source.identifier,
                &import.path,
                enabled,
            )
            .await
    }
}
