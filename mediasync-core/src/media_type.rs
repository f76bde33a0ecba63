//! Media type taxonomy shared by the whole engine.
//!
//! A media type is a label for one kind of library entry (movie, season,
//! song, ...). Some types only make sense together: a season without its
//! tvshow and episodes is meaningless, so imports always operate on an
//! ordered, dependency-closed group of types (see [`GroupedMediaTypes`]).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// All media types known to the engine.
///
/// The declaration order is the canonical global ordering used as a
/// tie-break when topologically sorting handlers, which keeps grouped types
/// (`tvshow < season < episode`, `artist < album < song`) in their natural
/// processing order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    #[serde(rename = "set")]
    VideoCollection,
    #[serde(rename = "musicvideo")]
    MusicVideo,
    #[serde(rename = "tvshow")]
    TvShow,
    Season,
    Episode,
    Artist,
    Album,
    Song,
}

impl MediaType {
    /// Every media type, in canonical order.
    pub const ALL: [MediaType; 9] = [
        MediaType::Movie,
        MediaType::VideoCollection,
        MediaType::MusicVideo,
        MediaType::TvShow,
        MediaType::Season,
        MediaType::Episode,
        MediaType::Artist,
        MediaType::Album,
        MediaType::Song,
    ];

    /// The singular wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::VideoCollection => "set",
            MediaType::MusicVideo => "musicvideo",
            MediaType::TvShow => "tvshow",
            MediaType::Season => "season",
            MediaType::Episode => "episode",
            MediaType::Artist => "artist",
            MediaType::Album => "album",
            MediaType::Song => "song",
        }
    }

    /// The plural wire label.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            MediaType::Movie => "movies",
            MediaType::VideoCollection => "sets",
            MediaType::MusicVideo => "musicvideos",
            MediaType::TvShow => "tvshows",
            MediaType::Season => "seasons",
            MediaType::Episode => "episodes",
            MediaType::Artist => "artists",
            MediaType::Album => "albums",
            MediaType::Song => "songs",
        }
    }

    /// Whether entries of this type contain other entries (shows contain
    /// seasons, albums contain songs, ...).
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            MediaType::VideoCollection
                | MediaType::TvShow
                | MediaType::Season
                | MediaType::Artist
                | MediaType::Album
        )
    }

    /// Whether this type lives in the video or the music half of the library.
    #[must_use]
    pub const fn is_video(self) -> bool {
        matches!(
            self,
            MediaType::Movie
                | MediaType::VideoCollection
                | MediaType::MusicVideo
                | MediaType::TvShow
                | MediaType::Season
                | MediaType::Episode
        )
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    /// Accepts the singular or plural label, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        MediaType::ALL
            .into_iter()
            .find(|mt| mt.as_str() == lower || mt.plural() == lower)
            .ok_or_else(|| Error::UnknownMediaType(s.to_string()))
    }
}

/// Unordered set of media types (e.g. what a source offers).
pub type MediaTypeSet = BTreeSet<MediaType>;

/// An ordered, dependency-closed list of media types processed as a unit.
///
/// Together with the import path this is the identity of an [`crate::models::Import`],
/// so it is hashable and comparable. The order is the synchronisation order;
/// cleanup and removal walk it in reverse.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupedMediaTypes(Vec<MediaType>);

impl GroupedMediaTypes {
    #[must_use]
    pub fn new(types: Vec<MediaType>) -> Self {
        Self(types)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, media_type: MediaType) -> bool {
        self.0.contains(&media_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = MediaType> + '_ {
        self.0.iter().copied()
    }

    /// Iterate in reverse (cleanup / removal) order.
    pub fn iter_reverse(&self) -> impl Iterator<Item = MediaType> + '_ {
        self.0.iter().rev().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[MediaType] {
        &self.0
    }

    /// The contained types as an unordered set.
    #[must_use]
    pub fn to_set(&self) -> MediaTypeSet {
        self.0.iter().copied().collect()
    }
}

impl From<Vec<MediaType>> for GroupedMediaTypes {
    fn from(types: Vec<MediaType>) -> Self {
        Self(types)
    }
}

impl fmt::Display for GroupedMediaTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|mt| mt.as_str())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

impl FromStr for GroupedMediaTypes {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let types = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(MediaType::from_str)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(types))
    }
}

/// Topologically sorts `nodes` so that for every `(dependent, required)`
/// edge the required type comes first. Ties are broken by the canonical
/// [`MediaType`] order, which is what keeps grouped types in group order.
///
/// Edges mentioning types outside `nodes` are ignored. Should the edge set
/// contain a cycle the remaining types are appended in canonical order.
#[must_use]
pub fn sort_topologically(
    nodes: &MediaTypeSet,
    edges: &[(MediaType, MediaType)],
) -> Vec<MediaType> {
    use std::collections::BTreeMap;

    let mut indegree: BTreeMap<MediaType, usize> =
        nodes.iter().map(|mt| (*mt, 0)).collect();
    let mut dependents: BTreeMap<MediaType, Vec<MediaType>> = BTreeMap::new();

    for (dependent, required) in edges {
        if !nodes.contains(dependent) || !nodes.contains(required) {
            continue;
        }
        *indegree.entry(*dependent).or_default() += 1;
        dependents.entry(*required).or_default().push(*dependent);
    }

    let mut ready: BTreeSet<MediaType> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(mt, _)| *mt)
        .collect();

    let mut sorted = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.iter().next().copied() {
        ready.remove(&next);
        sorted.push(next);

        if let Some(deps) = dependents.get(&next) {
            for dependent in deps {
                let degree = indegree
                    .get_mut(dependent)
                    .expect("edge endpoints are seeded above");
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    // cycle fallback
    for node in nodes {
        if !sorted.contains(node) {
            sorted.push(*node);
        }
    }

    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for mt in MediaType::ALL {
            assert_eq!(mt.as_str().parse::<MediaType>().unwrap(), mt);
            assert_eq!(mt.plural().parse::<MediaType>().unwrap(), mt);
        }
        assert_eq!("TvShows".parse::<MediaType>().unwrap(), MediaType::TvShow);
        assert!("podcast".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_string(&MediaType::VideoCollection).unwrap();
        assert_eq!(json, "\"set\"");
        let back: MediaType = serde_json::from_str("\"musicvideo\"").unwrap();
        assert_eq!(back, MediaType::MusicVideo);
    }

    #[test]
    fn test_grouped_display_round_trip() {
        let group = GroupedMediaTypes::new(vec![
            MediaType::TvShow,
            MediaType::Season,
            MediaType::Episode,
        ]);
        assert_eq!(group.to_string(), "tvshow,season,episode");
        assert_eq!(
            "tvshow,season,episode".parse::<GroupedMediaTypes>().unwrap(),
            group
        );
    }

    #[test]
    fn test_sort_respects_edges() {
        let nodes: MediaTypeSet = [MediaType::Episode, MediaType::Season, MediaType::TvShow]
            .into_iter()
            .collect();
        // season requires episode, and group order adds tvshow before season
        let edges = vec![
            (MediaType::Season, MediaType::TvShow),
            (MediaType::Episode, MediaType::Season),
            (MediaType::Episode, MediaType::TvShow),
        ];
        let sorted = sort_topologically(&nodes, &edges);
        assert_eq!(
            sorted,
            vec![MediaType::TvShow, MediaType::Season, MediaType::Episode]
        );
    }

    #[test]
    fn test_sort_without_edges_uses_canonical_order() {
        let nodes: MediaTypeSet = [MediaType::Song, MediaType::Movie, MediaType::Artist]
            .into_iter()
            .collect();
        let sorted = sort_topologically(&nodes, &[]);
        assert_eq!(
            sorted,
            vec![MediaType::Movie, MediaType::Artist, MediaType::Song]
        );
    }

    #[test]
    fn test_sort_ignores_foreign_edges() {
        let nodes: MediaTypeSet = [MediaType::Movie].into_iter().collect();
        let edges = vec![(MediaType::Episode, MediaType::TvShow)];
        assert_eq!(sort_topologically(&nodes, &edges), vec![MediaType::Movie]);
    }

    #[test]
    fn test_sort_cycle_falls_back_to_canonical() {
        let nodes: MediaTypeSet = [MediaType::Album, MediaType::Song].into_iter().collect();
        let edges = vec![
            (MediaType::Album, MediaType::Song),
            (MediaType::Song, MediaType::Album),
        ];
        let sorted = sort_topologically(&nodes, &edges);
        assert_eq!(sorted, vec![MediaType::Album, MediaType::Song]);
    }
}
