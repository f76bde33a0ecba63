//! Shared behavior of the video-side handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::library::MediaLibrary;
use crate::media_type::MediaType;
use crate::models::{ChangesetType, Import, MediaItem};
use crate::Result;

/// Artwork the library adds on its own. Stripped before comparing so a
/// remote item without artwork doesn't read as a change.
fn is_auto_added_art(slot: &str, url: &str) -> bool {
    url == "DefaultVideo.png"
        || url.starts_with("image://")
        || slot.starts_with("set.")
        || slot.starts_with("tvshow.")
        || slot.starts_with("season.")
}

pub(crate) fn strip_auto_art(art: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    art.iter()
        .filter(|(slot, url)| !is_auto_added_art(slot, url))
        .map(|(slot, url)| (slot.clone(), url.clone()))
        .collect()
}

/// Identity by source path.
pub(crate) fn find_by_path(local_items: &[MediaItem], path: &str) -> Option<usize> {
    local_items.iter().position(|item| item.path == path)
}

/// Whether the retrieved item differs from the stored one under the
/// import's settings.
pub(crate) fn video_changed(import: &Import, remote: &MediaItem, local: &MediaItem) -> bool {
    if remote.title != local.title {
        return true;
    }

    if strip_auto_art(&remote.art) != strip_auto_art(&local.art) {
        return true;
    }

    let mut remote_info = remote.video.clone().unwrap_or_default();
    let mut local_info = local.video.clone().unwrap_or_default();

    // library linkage is never part of the comparison
    remote_info.show_id = None;
    local_info.show_id = None;

    // a source that provides no cast at all doesn't mean "remove the cast"
    if remote_info.cast.is_empty() {
        local_info.cast.clear();
    }

    if remote_info != local_info {
        return true;
    }

    import.settings.update_playback_metadata_from_source() && remote.playback != local.playback
}

/// Copies identity and linkage from the stored item into the retrieved one
/// so it can be written back.
pub(crate) fn prepare_video_item(import: &Import, remote: &mut MediaItem, local: &MediaItem) {
    remote.library_id = local.library_id;
    remote.source_id = local.source_id.clone();
    remote.import_path = local.import_path.clone();
    remote.enabled = local.enabled;

    let local_info = local.video.clone().unwrap_or_default();
    let remote_info = remote.video_mut();
    remote_info.show_id = local_info.show_id;
    if remote_info.cast.is_empty() {
        remote_info.cast = local_info.cast;
    }

    if !import.settings.update_playback_metadata_from_source() {
        remote.playback = local.playback.clone();
    }
}

pub(crate) fn determine_video_changeset(
    import: &Import,
    remote: &MediaItem,
    local: &MediaItem,
) -> ChangesetType {
    if video_changed(import, remote, local) {
        ChangesetType::Changed
    } else {
        ChangesetType::None
    }
}

/// One level up in the path hierarchy, used when synthesising a parent
/// entry (e.g. the show of an orphaned season).
pub(crate) fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => trimmed[..=pos].to_string(),
        None => trimmed.to_string(),
    }
}

/// Stamps a fresh item with the import's attribution.
pub(crate) fn attribute_item(import: &Import, item: &mut MediaItem) {
    item.set_attribution(&import.source.identifier, &import.path);
    item.enabled = true;
}

/// Per-job lookup of shows imported from one source, keyed by title.
///
/// Seasons and episodes resolve their parent show through this cache; it is
/// warmed when the owning handler starts its synchronisation pass and
/// updated when a stub show is synthesised.
#[derive(Default)]
pub(crate) struct ShowCache {
    shows: std::collections::HashMap<String, Vec<MediaItem>>,
}

impl ShowCache {
    pub(crate) async fn warm(
        &mut self,
        library: &Arc<dyn MediaLibrary>,
        source_id: &str,
    ) -> Result<()> {
        self.shows.clear();
        for show in library.items(MediaType::TvShow, source_id, None).await? {
            if show.title.is_empty() {
                continue;
            }
            self.shows.entry(show.title.clone()).or_default().push(show);
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, show: MediaItem) {
        self.shows.entry(show.title.clone()).or_default().push(show);
    }

    /// Resolves the library id of the show a season/episode belongs to:
    /// first by title, then by path prefix when several shows share it.
    pub(crate) fn find_show_id(&self, item: &MediaItem) -> Option<u64> {
        let title = item.video.as_ref().and_then(|v| v.show_title.as_deref())?;
        let candidates = self.shows.get(title)?;
        let matched = match candidates.len() {
            0 => return None,
            1 => &candidates[0],
            _ => candidates
                .iter()
                .find(|show| crate::paths::is_within_base(&show.path, &item.path))
                .unwrap_or(&candidates[0]),
        };
        matched.library_id
    }
}

/// Inserts a minimal show assembled from the show-level fields of one of
/// its seasons or episodes. Used when items arrive for a show the library
/// doesn't know yet.
pub(crate) async fn synthesise_stub_show(
    library: &Arc<dyn MediaLibrary>,
    import: &Import,
    child: &MediaItem,
) -> Result<MediaItem> {
    let info = child.video.clone().unwrap_or_default();
    let title = info
        .show_title
        .clone()
        .unwrap_or_else(|| child.title.clone());

    let mut show = MediaItem::new(MediaType::TvShow, parent_path(&child.path), title);
    {
        let show_info = show.video_mut();
        show_info.year = info.year;
        show_info.premiered = info.premiered.clone();
        show_info.plot = info.plot.clone();
        show_info.genres = info.genres.clone();
        show_info.directors = info.directors.clone();
        show_info.writers = info.writers.clone();
        show_info.studios = info.studios.clone();
        show_info.countries = info.countries.clone();
        show_info.cast = info.cast.clone();
        show_info.mpaa = info.mpaa.clone();
        show_info.base_path = info.base_path.clone();
    }
    attribute_item(import, &mut show);
    library.insert(&mut show).await?;
    Ok(show)
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
