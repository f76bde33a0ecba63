//! Changeset classification of retrieved items.

use serde::{Deserialize, Serialize};

use super::MediaItem;

/// How an item relates to the local library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangesetType {
    /// Unclassified; resolved by the changeset task (and never emitted
    /// past it).
    #[default]
    None,
    Added,
    Changed,
    Removed,
}

/// One classified item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesetItem {
    pub changeset: ChangesetType,
    pub item: MediaItem,
}

impl ChangesetItem {
    #[must_use]
    pub fn new(changeset: ChangesetType, item: MediaItem) -> Self {
        Self { changeset, item }
    }
}

/// A batch of classified items of one media type.
pub type ChangesetItems = Vec<ChangesetItem>;
