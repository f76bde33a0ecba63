//! An import is the instruction to pull one ordered group of media types
//! from one path of a source.

use chrono::{DateTime, Utc};

use crate::media_type::{GroupedMediaTypes, MediaType};
use crate::settings::ImportSettings;

use super::Source;

/// Identity of an import inside maps: `(path, ordered media types)`.
pub type ImportKey = (String, GroupedMediaTypes);

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// VFS-style URL; must be the source's base path or a descendant of it.
    pub path: String,
    /// Ordered, dependency-closed media types pulled by this import.
    pub media_types: GroupedMediaTypes,
    /// Snapshot of the owning source. The authoritative copy lives in the
    /// source store; this one travels with the import through the pipeline.
    pub source: Source,
    /// Recursive imports cover the whole subtree below `path`.
    pub recursive: bool,
    pub last_synced: Option<DateTime<Utc>>,
    pub settings: ImportSettings,
}

impl Import {
    /// An import covering the whole subtree below `path`.
    #[must_use]
    pub fn recursive(
        path: impl Into<String>,
        media_types: GroupedMediaTypes,
        source: Source,
    ) -> Self {
        Self::new(path, media_types, source, true)
    }

    /// An import covering exactly `path`.
    #[must_use]
    pub fn selective(
        path: impl Into<String>,
        media_types: GroupedMediaTypes,
        source: Source,
    ) -> Self {
        Self::new(path, media_types, source, false)
    }

    fn new(
        path: impl Into<String>,
        media_types: GroupedMediaTypes,
        source: Source,
        recursive: bool,
    ) -> Self {
        Self {
            path: path.into(),
            media_types,
            source,
            recursive,
            last_synced: None,
            settings: ImportSettings::new(),
        }
    }

    #[must_use]
    pub fn contains_media_type(&self, media_type: MediaType) -> bool {
        self.media_types.contains(media_type)
    }

    #[must_use]
    pub fn key(&self) -> ImportKey {
        (self.path.clone(), self.media_types.clone())
    }

    /// Records a completed synchronisation on the import and its embedded
    /// source snapshot.
    pub fn mark_synced(&mut self, when: DateTime<Utc>) {
        self.last_synced = Some(when);
        self.source.last_synced = Some(when);
    }

    /// Deep copy; see [`Source::clone_deep`].
    #[must_use]
    pub fn clone_deep(&self) -> Self {
        self.clone()
    }

    /// Equality as a repository sees it (the embedded source compares by
    /// persisted state only).
    #[must_use]
    pub fn same_persisted_state(&self, other: &Import) -> bool {
        self.path == other.path
            && self.media_types == other.media_types
            && self.recursive == other.recursive
            && self.last_synced == other.last_synced
            && self.settings == other.settings
            && self.source.identifier == other.source.identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn import() -> Import {
        let source = Source::new("uuid-A", "src://uuid-A/");
        Import::recursive(
            "src://uuid-A/movies/",
            GroupedMediaTypes::new(vec![MediaType::Movie]),
            source,
        )
    }

    #[test]
    fn test_key_identity() {
        let a = import();
        let mut b = a.clone();
        assert_eq!(a.key(), b.key());
        b.recursive = false;
        // recursive flag is not part of the identity
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_mark_synced_touches_source_snapshot() {
        let mut import = import();
        let when = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        import.mark_synced(when);
        assert_eq!(import.last_synced, Some(when));
        assert_eq!(import.source.last_synced, Some(when));
    }

    #[test]
    fn test_persisted_state_ignores_source_transients() {
        let a = import();
        let mut b = a.clone();
        b.source.active = true;
        b.source.ready = true;
        assert!(a.same_persisted_state(&b));
    }
}
