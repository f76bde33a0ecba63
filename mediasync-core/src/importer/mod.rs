//! The per-source-kind adapter contract.
//!
//! An importer factory describes one kind of source (a network protocol
//! family, a plugin system, ...) and produces three cooperating pieces: a
//! long-lived discoverer, a per-call importer and an optional observer that
//! receives lifecycle notifications.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Import, Source};
use crate::task::{ImportItemsRetrievalTask, UpdateTask};
use crate::Result;

/// Factory registered with the manager for one importer id.
pub trait ImporterFactory: Send + Sync {
    /// Unique identification of the importer kind.
    fn id(&self) -> &str;

    /// Long-lived component that starts background listeners and announces
    /// discovered sources to the manager.
    fn create_discoverer(&self) -> Box<dyn ImporterDiscoverer>;

    /// Stateless-per-call import logic.
    fn create_importer(&self) -> Box<dyn Importer>;

    /// Receiver of source/import lifecycle events, if the importer wants
    /// them.
    fn create_observer(&self) -> Option<Box<dyn SourceObserver>>;
}

/// Started once during manager initialization.
#[async_trait]
pub trait ImporterDiscoverer: Send + Sync {
    /// Kicks off importer-specific discovery tasks. Must not block beyond
    /// its own setup.
    async fn start(&self) {}
}

/// One kind of source, engine-facing side.
///
/// Methods returning `bool` report "did it work / is it the case"; errors
/// are recoverable by definition and must be handled (and logged) inside
/// the adapter.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Whether sources of this kind can be looked up manually.
    fn can_lookup_source(&self) -> bool {
        false
    }

    /// Protocol label offered for manual source lookup (e.g. `upnp`).
    fn source_lookup_protocol(&self) -> &str {
        ""
    }

    /// Tries to locate a new source, filling in identifier, base path,
    /// friendly name and available media types. May block on the network.
    async fn discover_source(&self, source: &mut Source) -> bool;

    /// Confirms that a previously known source is currently reachable.
    async fn lookup_source(&self, source: &Source) -> bool;

    /// Whether this importer can import items from the given path. May be
    /// called with paths belonging to other sources.
    fn can_import(&self, path: &str) -> bool;

    /// Whether the source can serve requests right now. Must be fast or
    /// block on at most a single network probe.
    async fn is_source_ready(&self, source: &mut Source) -> bool;

    async fn is_import_ready(&self, import: &mut Import) -> bool;

    /// Fetches adapter-specific setting definitions and installs them into
    /// the source's bundle.
    async fn load_source_settings(&self, _source: &mut Source) -> bool {
        false
    }

    /// Saves and tears down what [`load_source_settings`](Importer::load_source_settings)
    /// set up.
    async fn unload_source_settings(&self, _source: &mut Source) -> bool {
        false
    }

    async fn load_import_settings(&self, _import: &mut Import) -> bool {
        false
    }

    async fn unload_import_settings(&self, _import: &mut Import) -> bool {
        false
    }

    /// Capability queries, per path. Must not have side effects.
    fn can_update_metadata_on_source(&self, _path: &str) -> bool {
        false
    }

    fn can_update_playcount_on_source(&self, _path: &str) -> bool {
        false
    }

    fn can_update_last_played_on_source(&self, _path: &str) -> bool {
        false
    }

    fn can_update_resume_position_on_source(&self, _path: &str) -> bool {
        false
    }

    /// Retrieves the import's items and deposits them into the task,
    /// bucketed by media type. Streaming via
    /// [`ImportItemsRetrievalTask::add_items`] is preferred; an adapter
    /// that computes deltas itself marks the batch with
    /// [`ImportItemsRetrievalTask::set_changeset`].
    async fn import(&self, task: &mut ImportItemsRetrievalTask) -> Result<()>;

    /// Pushes one item's playback metadata to the source. The adapter is
    /// responsible for suppressing fields it cannot write (see the
    /// `can_update_*` capabilities).
    async fn update_on_source(&self, task: &UpdateTask) -> Result<()>;
}

/// Receives source/import lifecycle notifications for one importer kind.
///
/// The default implementations ignore everything, so observers only
/// implement what they care about.
#[async_trait]
pub trait SourceObserver: Send + Sync {
    async fn on_source_added(&self, _source: &Source) {}
    async fn on_source_updated(&self, _source: &Source) {}
    async fn on_source_removed(&self, _source: &Source) {}
    async fn on_source_activated(&self, _source: &Source) {}
    async fn on_source_deactivated(&self, _source: &Source) {}
    async fn on_import_added(&self, _import: &Import) {}
    async fn on_import_updated(&self, _import: &Import) {}
    async fn on_import_removed(&self, _import: &Import) {}
}

/// Resolves the importer responsible for a source or path. Implemented by
/// the manager; consumed by the task processor.
pub trait ImporterResolver: Send + Sync {
    fn importer_for_source(&self, source: &Source) -> Option<Arc<dyn Importer>>;

    fn importer_for_path(&self, path: &str) -> Option<Arc<dyn Importer>>;
}
