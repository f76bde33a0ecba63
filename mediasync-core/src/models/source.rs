//! A source is a logical origin of media items, e.g. one network media
//! server or one content provider plugin instance.

use chrono::{DateTime, Utc};

use crate::media_type::MediaTypeSet;
use crate::settings::SourceSettings;

/// External provider of media metadata.
///
/// `active` and `ready` are transient runtime state: `active` is operator
/// intent ("use this source"), `ready` is the adapter's confirmation that it
/// can currently serve requests. Both take part in plain equality (which is
/// what display surfaces compare) but not in [`Source::same_persisted_state`],
/// which is what repositories consult.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Globally unique opaque identifier (device UUID, plugin id, ...).
    pub identifier: String,
    /// VFS-style URL every import path of this source must live under.
    pub base_path: String,
    pub friendly_name: String,
    pub icon_url: String,
    /// Media types the source can provide; always a superset of the types
    /// of its imports.
    pub available_media_types: MediaTypeSet,
    pub last_synced: Option<DateTime<Utc>>,
    /// Whether the source was added by hand (such sources are kept alive by
    /// the lookup heartbeat) or found by discovery.
    pub manually_added: bool,
    /// Id of the importer adapter responsible for this source.
    pub importer_id: String,
    pub settings: SourceSettings,
    pub active: bool,
    pub ready: bool,
}

impl Source {
    #[must_use]
    pub fn new(identifier: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            base_path: base_path.into(),
            friendly_name: String::new(),
            icon_url: String::new(),
            available_media_types: MediaTypeSet::new(),
            last_synced: None,
            manually_added: false,
            importer_id: String::new(),
            settings: SourceSettings::new(),
            active: false,
            ready: false,
        }
    }

    #[must_use]
    pub fn is_media_type_available(&self, media_type: crate::media_type::MediaType) -> bool {
        self.available_media_types.contains(&media_type)
    }

    /// Deep copy. `Clone` already duplicates the settings bundle (it has no
    /// shared interior); this alias documents the guarantee at call sites
    /// that rely on it.
    #[must_use]
    pub fn clone_deep(&self) -> Self {
        self.clone()
    }

    /// Equality as a repository sees it: transient flags don't count.
    #[must_use]
    pub fn same_persisted_state(&self, other: &Source) -> bool {
        self.identifier == other.identifier
            && self.base_path == other.base_path
            && self.friendly_name == other.friendly_name
            && self.icon_url == other.icon_url
            && self.available_media_types == other.available_media_types
            && self.last_synced == other.last_synced
            && self.manually_added == other.manually_added
            && self.importer_id == other.importer_id
            && self.settings == other.settings
    }

    /// Folds another repository's view of the same source into this one:
    /// media types are united, the newer `last_synced` wins.
    pub fn merge(&mut self, other: &Source) {
        self.available_media_types
            .extend(other.available_media_types.iter().copied());
        if other.last_synced > self.last_synced {
            self.last_synced = other.last_synced;
        }
    }
}
