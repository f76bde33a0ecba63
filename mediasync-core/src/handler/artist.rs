//! Artist handler.
//!
//! Artists are containers referenced by albums and songs via their name, so
//! they are never deleted item-by-item; the cleanup pass prunes artists
//! nothing references anymore.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::library::MediaLibrary;
use crate::media_type::MediaType;
use crate::models::{ChangesetType, Import, MediaItem};
use crate::Result;

use super::music;
use super::MediaTypeHandler;

pub struct ArtistImportHandler {
    library: Arc<dyn MediaLibrary>,
}

impl ArtistImportHandler {
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self { library }
    }

    async fn is_artist_referenced(&self, name: &str) -> Result<bool> {
        let albums = self.library.all_items(MediaType::Album).await?;
        if albums.iter().any(|album| {
            album
                .music
                .as_ref()
                .is_some_and(|m| m.album_artists.iter().any(|a| a == name))
        }) {
            return Ok(true);
        }

        let songs = self.library.all_items(MediaType::Song).await?;
        Ok(songs.iter().any(|song| {
            song.music
                .as_ref()
                .is_some_and(|m| m.artists.iter().any(|a| a == name))
        }))
    }
}

#[async_trait]
impl MediaTypeHandler for ArtistImportHandler {
    fn media_type(&self) -> MediaType {
        MediaType::Artist
    }

    fn grouped_media_types(&self) -> Vec<MediaType> {
        vec![MediaType::Artist, MediaType::Album, MediaType::Song]
    }

    fn create(&self) -> Box<dyn MediaTypeHandler> {
        Box::new(Self::new(self.library.clone()))
    }

    async fn local_items(&self, import: &Import) -> Result<Vec<MediaItem>> {
        self.library
            .items(
                MediaType::Artist,
                &import.source.identifier,
                Some(&import.path),
            )
            .await
    }

    /// Artists are identified by their MusicBrainz id when both sides have
    /// one, otherwise by name.
    fn find_matching_local_item(
        &self,
        _import: &Import,
        remote: &MediaItem,
        local_items: &[MediaItem],
    ) -> Option<usize> {
        let remote_mbid = remote
            .music
            .as_ref()
            .and_then(|m| m.musicbrainz_artist_id.as_deref());
        if let Some(mbid) = remote_mbid {
            if let Some(index) = local_items.iter().position(|local| {
                local
                    .music
                    .as_ref()
                    .and_then(|m| m.musicbrainz_artist_id.as_deref())
                    == Some(mbid)
            }) {
                return Some(index);
            }
        }
        local_items.iter().position(|local| local.title == remote.title)
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
        self.library.begin(MediaType::Artist).await
    }

    async fn finish_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.commit(MediaType::Artist).await
    }

    async fn abort_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.rollback(MediaType::Artist).await
    }

    async fn add_imported_item(&mut self, import: &Import, item: &mut MediaItem) -> Result<()> {
        music::attribute_item(import, item);
        self.library.insert(item).await?;
        Ok(())
    }

    async fn update_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        self.library.update(item).await
    }

    async fn remove_imported_item(&mut self, _import: &Import, _item: &MediaItem) -> Result<()> {
        Ok(())
    }

    async fn cleanup_imported_items(&mut self, import: &Import) -> Result<()> {
        let artists = self.local_items(import).await?;
        for artist in artists {
            let Some(id) = artist.library_id else {
                continue;
            };
            if !self.is_artist_referenced(&artist.title).await? {
                debug!(artist = %artist.title, "removing artist without albums or songs");
                self.library.remove(MediaType::Artist, id).await?;
            }
        }
        Ok(())
    }

    async fn remove_imported_items(&mut self, import: &Import) -> Result<()> {
        music::remove_all_imported(&self.library, MediaType::Artist, import).await
    }

    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()> {
        self.library
            .set_enabled(
                MediaType::Artist,
                &import.source.identifier,
                &import.path,
                enabled,
            )
            .await
    }
}
