//! Media items as exchanged between importers, handlers and the library.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media_type::MediaType;

/// One cast entry of a video item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CastMember {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub order: u32,
}

/// Video-specific metadata. Only the fields relevant for the media type at
/// hand are filled; the rest stay at their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VideoInfo {
    #[serde(default)]
    pub plot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premiered: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub writers: Vec<String>,
    #[serde(default)]
    pub studios: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpaa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_secs: Option<u32>,
    /// Name of the collection ("set") a movie belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Title of the owning show (seasons and episodes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_title: Option<String>,
    /// Season number (seasons and episodes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<i32>,
    /// Episode number within the season.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<i32>,
    /// Library id of the owning show, resolved during synchronisation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_id: Option<u64>,
    /// Base path of the item on its source, used when synthesising parents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

/// Music-specific metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MusicInfo {
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default)]
    pub album_artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub musicbrainz_track_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub musicbrainz_album_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub musicbrainz_artist_id: Option<String>,
    /// Library id of the owning album, resolved during synchronisation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<u64>,
}

/// Playback state of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlaybackInfo {
    #[serde(default)]
    pub play_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_seconds: Option<f64>,
}

fn default_enabled() -> bool {
    true
}

/// A media item, either freshly retrieved from a source or already living
/// in the local library.
///
/// `path` is the item's URL on its source and doubles as the identity for
/// path-matched media types (movies, episodes, music videos, songs).
/// `source_id` / `import_path` record where an imported item came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Assigned by the library on insert; `None` for remote items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_id: Option<u64>,
    pub media_type: MediaType,
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub import_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicInfo>,
    /// Artwork by slot name (`poster`, `fanart`, ...) to image URL.
    #[serde(default)]
    pub art: BTreeMap<String, String>,
    #[serde(default)]
    pub playback: PlaybackInfo,
    /// Disabled items are hidden from the library surface, e.g. while their
    /// source is inactive.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl MediaItem {
    #[must_use]
    pub fn new(media_type: MediaType, path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            library_id: None,
            media_type,
            title: title.into(),
            path: path.into(),
            source_id: String::new(),
            import_path: String::new(),
            video: None,
            music: None,
            art: BTreeMap::new(),
            playback: PlaybackInfo::default(),
            enabled: true,
        }
    }

    /// The video section, created on demand.
    pub fn video_mut(&mut self) -> &mut VideoInfo {
        self.video.get_or_insert_with(VideoInfo::default)
    }

    /// The music section, created on demand.
    pub fn music_mut(&mut self) -> &mut MusicInfo {
        self.music.get_or_insert_with(MusicInfo::default)
    }

    /// Marks the item as imported through the given source and import path.
    pub fn set_attribution(&mut self, source_id: &str, import_path: &str) {
        self.source_id = source_id.to_string();
        self.import_path = import_path.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_defaults() {
        let item = MediaItem::new(MediaType::Movie, "src://a/m1", "M1");
        assert!(item.enabled);
        assert!(item.library_id.is_none());
        assert!(item.video.is_none());
        assert_eq!(item.playback.play_count, 0);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut item = MediaItem::new(MediaType::Episode, "src://a/e1", "Pilot");
        item.video_mut().show_title = Some("Show X".to_string());
        item.video_mut().season = Some(1);
        item.video_mut().episode = Some(1);
        item.art.insert("thumb".into(), "http://img/1".into());
        item.playback.play_count = 2;

        let json = serde_json::to_string(&item).unwrap();
        let back: MediaItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_enabled_defaults_to_true_when_missing() {
        let json = r#"{"media_type":"movie","title":"M","path":"src://a/m"}"#;
        let item: MediaItem = serde_json::from_str(json).unwrap();
        assert!(item.enabled);
    }
}
