//! Lifecycle event feed.

use crate::models::{Import, Source};

/// One lifecycle transition. Every transition is emitted exactly once, to
/// the broadcast feed and to the observer of the affected source's
/// importer.
#[derive(Debug, Clone)]
pub enum ImportEvent {
    SourceAdded(Source),
    SourceUpdated(Source),
    SourceRemoved(Source),
    SourceActivated(Source),
    SourceDeactivated(Source),
    ImportAdded(Import),
    ImportUpdated(Import),
    ImportRemoved(Import),
}

impl ImportEvent {
    /// Stable wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ImportEvent::SourceAdded(_) => "source_added",
            ImportEvent::SourceUpdated(_) => "source_updated",
            ImportEvent::SourceRemoved(_) => "source_removed",
            ImportEvent::SourceActivated(_) => "source_activated",
            ImportEvent::SourceDeactivated(_) => "source_deactivated",
            ImportEvent::ImportAdded(_) => "import_added",
            ImportEvent::ImportUpdated(_) => "import_updated",
            ImportEvent::ImportRemoved(_) => "import_removed",
        }
    }

    /// For activation transitions, the new activity state.
    #[must_use]
    pub const fn active(&self) -> Option<bool> {
        match self {
            ImportEvent::SourceActivated(_) => Some(true),
            ImportEvent::SourceDeactivated(_) => Some(false),
            _ => None,
        }
    }

    /// The identifier of the source the event belongs to.
    #[must_use]
    pub fn source_identifier(&self) -> &str {
        match self {
            ImportEvent::SourceAdded(source)
            | ImportEvent::SourceUpdated(source)
            | ImportEvent::SourceRemoved(source)
            | ImportEvent::SourceActivated(source)
            | ImportEvent::SourceDeactivated(source) => &source.identifier,
            ImportEvent::ImportAdded(import)
            | ImportEvent::ImportUpdated(import)
            | ImportEvent::ImportRemoved(import) => &import.source.identifier,
        }
    }
}
