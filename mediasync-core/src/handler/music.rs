//! Shared behavior of the music-side handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::library::MediaLibrary;
use crate::media_type::MediaType;
use crate::models::{ChangesetType, Import, MediaItem};
use crate::Result;

/// Whether the retrieved music item differs from the stored one under the
/// import's settings.
pub(crate) fn music_changed(import: &Import, remote: &MediaItem, local: &MediaItem) -> bool {
    if remote.title != local.title || remote.art != local.art {
        return true;
    }

    let mut remote_info = remote.music.clone().unwrap_or_default();
    let mut local_info = local.music.clone().unwrap_or_default();

    // library linkage is never part of the comparison
    remote_info.album_id = None;
    local_info.album_id = None;

    if remote_info != local_info {
        return true;
    }

    import.settings.update_playback_metadata_from_source() && remote.playback != local.playback
}

pub(crate) fn determine_music_changeset(
    import: &Import,
    remote: &MediaItem,
    local: &MediaItem,
) -> ChangesetType {
    if music_changed(import, remote, local) {
        ChangesetType::Changed
    } else {
        ChangesetType::None
    }
}

/// Copies identity and linkage from the stored item into the retrieved one.
pub(crate) fn prepare_music_item(import: &Import, remote: &mut MediaItem, local: &MediaItem) {
    remote.library_id = local.library_id;
    remote.source_id = local.source_id.clone();
    remote.import_path = local.import_path.clone();
    remote.enabled = local.enabled;

    let local_info = local.music.clone().unwrap_or_default();
    remote.music_mut().album_id = local_info.album_id;

    if !import.settings.update_playback_metadata_from_source() {
        remote.playback = local.playback.clone();
    }
}

/// Stamps a fresh item with the import's attribution.
pub(crate) fn attribute_item(import: &Import, item: &mut MediaItem) {
    item.set_attribution(&import.source.identifier, &import.path);
    item.enabled = true;
}

/// Per-job lookup of albums imported from one source, keyed by title.
#[derive(Default)]
pub(crate) struct AlbumCache {
    albums: HashMap<String, Vec<MediaItem>>,
}

impl AlbumCache {
    pub(crate) async fn warm(
        &mut self,
        library: &Arc<dyn MediaLibrary>,
        source_id: &str,
    ) -> Result<()> {
        self.albums.clear();
        for album in library.items(MediaType::Album, source_id, None).await? {
            if album.title.is_empty() {
                continue;
            }
            self.albums
                .entry(album.title.clone())
                .or_default()
                .push(album);
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, album: MediaItem) {
        self.albums
            .entry(album.title.clone())
            .or_default()
            .push(album);
    }

    /// Resolves the album a song belongs to: by title, disambiguated by the
    /// album artists when several albums share it.
    pub(crate) fn find_album_id(&self, song: &MediaItem) -> Option<u64> {
        let info = song.music.as_ref()?;
        let title = info.album.as_deref()?;
        let candidates = self.albums.get(title)?;
        let matched = match candidates.len() {
            0 => return None,
            1 => &candidates[0],
            _ => candidates
                .iter()
                .find(|album| {
                    let album_artists = album
                        .music
                        .as_ref()
                        .map(|m| m.album_artists.as_slice())
                        .unwrap_or_default();
                    info.artists.iter().any(|a| album_artists.contains(a))
                })
                .unwrap_or(&candidates[0]),
        };
        matched.library_id
    }
}

/// Inserts a minimal album assembled from one of its songs. Used when a
/// song arrives for an album the library doesn't know yet.
pub(crate) async fn synthesise_stub_album(
    library: &Arc<dyn MediaLibrary>,
    import: &Import,
    song: &MediaItem,
) -> Result<MediaItem> {
    let info = song.music.clone().unwrap_or_default();
    let title = info.album.clone().unwrap_or_default();

    let mut album = MediaItem::new(MediaType::Album, String::new(), title);
    album.art = song.art.clone();
    {
        let album_info = album.music_mut();
        album_info.album_artists = info.artists.clone();
        album_info.genres = info.genres.clone();
        album_info.year = info.year;
        album_info.rating = info.rating;
        album_info.musicbrainz_album_id = info.musicbrainz_album_id.clone();
    }
    attribute_item(import, &mut album);
    library.insert(&mut album).await?;
    Ok(album)
}

pub(crate) async fn remove_all_imported(
    library: &Arc<dyn MediaLibrary>,
    media_type: MediaType,
    import: &Import,
) -> Result<()> {
    let items = library
        .items(media_type, &import.source.identifier, Some(&import.path))
        .await?;
    for item in items {
        if let Some(id) = item.library_id {
            library.remove(media_type, id).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_type::GroupedMediaTypes;
    use crate::models::Source;

    fn import() -> Import {
        Import::recursive(
            "src://uuid-M/",
            GroupedMediaTypes::new(vec![MediaType::Artist, MediaType::Album, MediaType::Song]),
            Source::new("uuid-M", "src://uuid-M/"),
        )
    }

    fn song(title: &str) -> MediaItem {
        let mut item = MediaItem::new(MediaType::Song, "src://uuid-M/t1.flac", title);
        item.music_mut().album = Some("Album".into());
        item
    }

    #[test]
    fn test_album_linkage_is_not_a_change() {
        let import = import();
        let remote = song("Track 1");
        let mut local = song("Track 1");
        local.music_mut().album_id = Some(11);
        assert!(!music_changed(&import, &remote, &local));
    }

    #[test]
    fn test_metadata_change_detected() {
        let import = import();
        let mut remote = song("Track 1");
        remote.music_mut().year = Some(1999);
        let local = song("Track 1");
        assert!(music_changed(&import, &remote, &local));
    }

    #[test]
    fn test_prepare_keeps_album_linkage() {
        let import = import();
        let mut remote = song("Track 1");
        let mut local = song("Track 1");
        local.library_id = Some(3);
        local.music_mut().album_id = Some(11);
        prepare_music_item(&import, &mut remote, &local);
        assert_eq!(remote.library_id, Some(3));
        assert_eq!(remote.music.as_ref().and_then(|m| m.album_id), Some(11));
    }
}
