//! Song handler.
//!
//! Songs are identified by their track URL. When a song arrives for an
//! album the library doesn't know yet, a stub album is synthesised from the
//! song's album-level fields and inserted first.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::library::MediaLibrary;
use crate::media_type::{MediaType, MediaTypeSet};
use crate::models::{ChangesetType, Import, MediaItem};
use crate::{Error, Result};

use super::music::{self, AlbumCache};
use super::MediaTypeHandler;

pub struct SongImportHandler {
    library: Arc<dyn MediaLibrary>,
    albums: AlbumCache,
}

impl SongImportHandler {
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            library,
            albums: AlbumCache::default(),
        }
    }
}

#[async_trait]
impl MediaTypeHandler for SongImportHandler {
    fn media_type(&self) -> MediaType {
        MediaType::Song
    }

    fn dependencies(&self) -> MediaTypeSet {
        [MediaType::Artist, MediaType::Album].into_iter().collect()
    }

    fn grouped_media_types(&self) -> Vec<MediaType> {
        vec![MediaType::Artist, MediaType::Album, MediaType::Song]
    }

    fn create(&self) -> Box<dyn MediaTypeHandler> {
        Box::new(Self::new(self.library.clone()))
    }

    fn item_label(&self, item: &MediaItem) -> String {
        match item.music.as_ref().and_then(|m| m.album.as_deref()) {
            Some(album) => format!("{album} - {}", item.title),
            None => item.title.clone(),
        }
    }

    async fn local_items(&self, import: &Import) -> Result<Vec<MediaItem>> {
        self.library
            .items(
                MediaType::Song,
                &import.source.identifier,
                Some(&import.path),
            )
            .await
    }

    /// Songs are identified by their track URL.
    fn find_matching_local_item(
        &self,
        _import: &Import,
        remote: &MediaItem,
        local_items: &[MediaItem],
    ) -> Option<usize> {
        local_items.iter().position(|local| local.path == remote.path)
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

    async fn start_synchronisation(&mut self, import: &Import) -> Result<()> {
        self.library.begin(MediaType::Song).await?;
        self.albums
            .warm(&self.library, &import.source.identifier)
            .await
    }

    async fn finish_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.commit(MediaType::Song).await
    }

    async fn abort_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.rollback(MediaType::Song).await
    }

    async fn add_imported_item(&mut self, import: &Import, item: &mut MediaItem) -> Result<()> {
        music::attribute_item(import, item);

        let has_album_name = item
            .music
            .as_ref()
            .and_then(|m| m.album.as_deref())
            .is_some_and(|album| !album.is_empty());
        if has_album_name {
            let album_id = match self.albums.find_album_id(item) {
                Some(id) => id,
                None => {
                    let stub = music::synthesise_stub_album(&self.library, import, item).await?;
                    debug!(
                        album = %stub.title,
                        album_id = ?stub.library_id,
                        "synthesised stub album for song"
                    );
                    let id = stub.library_id.unwrap_or_default();
                    self.albums.insert(stub);
                    id
                }
            };
            item.music_mut().album_id = Some(album_id);
        }

        self.library.insert(item).await?;
        Ok(())
    }

    async fn update_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        self.library.update(item).await
    }

    async fn remove_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        let id = item
            .library_id
            .ok_or_else(|| Error::InvalidInput("song has no library id".into()))?;
        self.library.remove(MediaType::Song, id).await
    }

    async fn cleanup_imported_items(&mut self, _import: &Import) -> Result<()> {
        Ok(())
    }

    async fn remove_imported_items(&mut self, import: &Import) -> Result<()> {
        music::remove_all_imported(&self.library, MediaType::Song, import).await
    }

    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()> {
        self.library
            .set_enabled(
                MediaType::Song,
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
            "src://uuid-M/",
            GroupedMediaTypes::new(vec![MediaType::Artist, MediaType::Album, MediaType::Song]),
            Source::new("uuid-M", "src://uuid-M/"),
        )
    }

    fn song(path: &str, album: Option<&str>) -> MediaItem {
        let mut item = MediaItem::new(MediaType::Song, path, "Track 1");
        let info = item.music_mut();
        info.artists = vec!["Artist A".to_string()];
        info.album = album.map(str::to_string);
        info.genres = vec!["Rock".to_string()];
        info.year = Some(2001);
        item
    }

    #[tokio::test]
    async fn test_add_synthesises_stub_album() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        let mut handler = SongImportHandler::new(library.clone());
        let import = import();

        handler.start_synchronisation(&import).await.unwrap();
        let mut item = song("src://uuid-M/t1.flac", Some("First Album"));
        handler.add_imported_item(&import, &mut item).await.unwrap();
        handler.finish_synchronisation(&import).await.unwrap();

        let albums = library.all_items(MediaType::Album).await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].title, "First Album");
        assert_eq!(
            albums[0].music.as_ref().map(|m| m.album_artists.clone()),
            Some(vec!["Artist A".to_string()])
        );
        assert_eq!(
            item.music.as_ref().and_then(|m| m.album_id),
            albums[0].library_id
        );

        // a second song of the same album reuses the stub
        let mut second = song("src://uuid-M/t2.flac", Some("First Album"));
        handler.start_synchronisation(&import).await.unwrap();
        handler.add_imported_item(&import, &mut second).await.unwrap();
        handler.finish_synchronisation(&import).await.unwrap();
        assert_eq!(library.all_items(MediaType::Album).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_song_without_album_has_no_linkage() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        let mut handler = SongImportHandler::new(library.clone());
        let import = import();

        handler.start_synchronisation(&import).await.unwrap();
        let mut item = song("src://uuid-M/loose.flac", None);
        handler.add_imported_item(&import, &mut item).await.unwrap();
        handler.finish_synchronisation(&import).await.unwrap();

        assert!(library.all_items(MediaType::Album).await.unwrap().is_empty());
        assert_eq!(item.music.as_ref().and_then(|m| m.album_id), None);
    }
}
