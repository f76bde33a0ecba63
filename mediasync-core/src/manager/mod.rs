//! The import manager: top-level facade of the engine.
//!
//! Owns the registries (repositories, importer factories, type handlers),
//! the in-memory source state, the job queues and the lifecycle event
//! feed. Initialisation order matters: register type handlers, then
//! importer factories, then repositories, then call
//! [`ImportManager::initialize`].

mod events;
mod heartbeat;
mod source_jobs;

pub use events::ImportEvent;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::handler::{grouped_order_edges, HandlerResolver, MediaTypeHandler};
use crate::importer::{
    Importer, ImporterDiscoverer, ImporterFactory, ImporterResolver, SourceObserver,
};
use crate::jobs::{LibraryQueue, SourceOpQueue};
use crate::media_type::{
    sort_topologically, GroupedMediaTypes, MediaType, MediaTypeSet,
};
use crate::models::{ChangesetItem, ChangesetItems, ChangesetType, Import, MediaItem, Source};
use crate::paths::{is_within_base, SourceBrowseFilter};
use crate::repository::ImportRepository;
use crate::task::{TaskContext, TaskProcessorJob};
use crate::{Error, Result};

/// Transient per-source state.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceRuntime {
    pub(crate) importer_id: String,
    pub(crate) active: bool,
    pub(crate) ready: bool,
    pub(crate) removing: bool,
}

pub(crate) struct ImporterRegistration {
    pub(crate) factory: Arc<dyn ImporterFactory>,
    pub(crate) discoverer: Arc<dyn ImporterDiscoverer>,
    pub(crate) observer: Option<Arc<dyn SourceObserver>>,
}

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    pub(crate) map: HashMap<MediaType, Arc<dyn MediaTypeHandler>>,
    /// Handlers in topological order (required types first).
    pub(crate) ordered: Vec<Arc<dyn MediaTypeHandler>>,
}

impl HandlerRegistry {
    fn rebuild_order(&mut self) {
        let nodes: MediaTypeSet = self.map.keys().copied().collect();
        let handlers: Vec<Arc<dyn MediaTypeHandler>> = self.map.values().cloned().collect();
        let edges = grouped_order_edges(&handlers);
        self.ordered = sort_topologically(&nodes, &edges)
            .into_iter()
            .filter_map(|mt| self.map.get(&mt).cloned())
            .collect();
    }
}

pub(crate) struct Inner {
    pub(crate) config: EngineConfig,
    pub(crate) repositories: RwLock<Vec<Arc<dyn ImportRepository>>>,
    pub(crate) sources: RwLock<HashMap<String, SourceRuntime>>,
    pub(crate) importers: RwLock<IndexMap<String, ImporterRegistration>>,
    pub(crate) handlers: RwLock<HandlerRegistry>,
    pub(crate) source_queue: SourceOpQueue,
    pub(crate) library_queue: LibraryQueue,
    pub(crate) events: broadcast::Sender<ImportEvent>,
    pub(crate) heartbeat: Mutex<Option<JoinHandle<()>>>,
    pub(crate) initialized: AtomicBool,
}

/// Resolver facade handed to task-processor jobs.
pub(crate) struct Resolvers(pub(crate) Arc<Inner>);

impl HandlerResolver for Resolvers {
    fn handler_for(&self, media_type: MediaType) -> Option<Arc<dyn MediaTypeHandler>> {
        self.0.handlers.read().map.get(&media_type).cloned()
    }
}

impl ImporterResolver for Resolvers {
    fn importer_for_source(&self, source: &Source) -> Option<Arc<dyn Importer>> {
        let importer_id = if source.importer_id.is_empty() {
            self.0
                .sources
                .read()
                .get(&source.identifier)
                .map(|runtime| runtime.importer_id.clone())?
        } else {
            source.importer_id.clone()
        };
        self.0.create_importer_by_id(&importer_id)
    }

    fn importer_for_path(&self, path: &str) -> Option<Arc<dyn Importer>> {
        let registrations = self.0.importers.read();
        for registration in registrations.values() {
            let importer: Arc<dyn Importer> = Arc::from(registration.factory.create_importer());
            if importer.can_import(path) {
                return Some(importer);
            }
        }
        None
    }
}

/// The media import engine.
///
/// One instance per process is the expected setup; it is cheap to clone
/// (all state is shared). Construct it inside a Tokio runtime — the job
/// queue workers are spawned immediately.
#[derive(Clone)]
pub struct ImportManager {
    inner: Arc<Inner>,
}

impl ImportManager {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.events.channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                repositories: RwLock::new(Vec::new()),
                sources: RwLock::new(HashMap::new()),
                importers: RwLock::new(IndexMap::new()),
                handlers: RwLock::new(HandlerRegistry::default()),
                source_queue: SourceOpQueue::new(),
                library_queue: LibraryQueue::new(),
                events,
                heartbeat: Mutex::new(None),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribes to the lifecycle event feed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.inner.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers the handler for its media type. Re-registrations of an
    /// already covered media type are ignored.
    pub fn register_type_handler(&self, handler: Arc<dyn MediaTypeHandler>) {
        let mut handlers = self.inner.handlers.write();
        let media_type = handler.media_type();
        if handlers.map.contains_key(&media_type) {
            return;
        }
        handlers.map.insert(media_type, handler);
        handlers.rebuild_order();
        debug!(%media_type, "registered type handler");
    }

    pub fn unregister_type_handler(&self, media_type: MediaType) {
        let mut handlers = self.inner.handlers.write();
        if handlers.map.remove(&media_type).is_some() {
            handlers.rebuild_order();
            debug!(%media_type, "unregistered type handler");
        }
    }

    /// Registers an importer factory and creates its discoverer/observer.
    /// When the manager is already initialized the discoverer is started
    /// right away.
    pub fn register_importer_factory(&self, factory: Arc<dyn ImporterFactory>) {
        let id = factory.id().to_string();
        let registration = ImporterRegistration {
            discoverer: Arc::from(factory.create_discoverer()),
            observer: factory.create_observer().map(Arc::from),
            factory,
        };

        let started = self.inner.initialized.load(Ordering::SeqCst);
        let discoverer = registration.discoverer.clone();

        let mut importers = self.inner.importers.write();
        if importers.contains_key(&id) {
            return;
        }
        importers.insert(id.clone(), registration);
        drop(importers);
        info!(importer = %id, "registered importer factory");

        if started {
            tokio::spawn(async move {
                discoverer.start().await;
            });
        }
    }

    pub fn register_repository(&self, repository: Arc<dyn ImportRepository>) {
        self.inner.repositories.write().push(repository);
    }

    /// Opens the repositories, loads the known sources, starts the
    /// discoverers and the heartbeat timer. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for repository in self.inner.repos_snapshot() {
            if let Err(err) = repository.initialize().await {
                error!(%err, "failed to initialize repository");
            }
        }

        // seed the runtime state with the persisted sources
        let sources = self.inner.merged_sources_all().await;
        {
            let mut runtime = self.inner.sources.write();
            for source in &sources {
                runtime
                    .entry(source.identifier.clone())
                    .or_insert_with(|| SourceRuntime {
                        importer_id: source.importer_id.clone(),
                        ..SourceRuntime::default()
                    });
            }
        }
        info!(count = sources.len(), "loaded persisted sources");

        let discoverers: Vec<Arc<dyn ImporterDiscoverer>> = {
            let importers = self.inner.importers.read();
            importers.values().map(|r| r.discoverer.clone()).collect()
        };
        for discoverer in discoverers {
            discoverer.start().await;
        }

        let handle = heartbeat::spawn(&self.inner);
        *self.inner.heartbeat.lock() = Some(handle);

        Ok(())
    }

    /// Stops the heartbeat and the queue workers.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.heartbeat.lock().take() {
            handle.abort();
        }
        self.inner.library_queue.shutdown();
        self.inner.source_queue.shutdown();
        self.inner.initialized.store(false, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The media types for which a handler is registered.
    #[must_use]
    pub fn supported_media_types(&self) -> MediaTypeSet {
        self.inner.handlers.read().map.keys().copied().collect()
    }

    /// The ordered group a media type belongs to, narrowed to registered
    /// handlers.
    #[must_use]
    pub fn grouped_media_types(&self, media_type: MediaType) -> GroupedMediaTypes {
        let handlers = self.inner.handlers.read();
        let Some(handler) = handlers.map.get(&media_type) else {
            return GroupedMediaTypes::default();
        };
        let group: Vec<MediaType> = handler
            .grouped_media_types()
            .into_iter()
            .filter(|mt| handlers.map.contains_key(mt))
            .collect();
        if group.is_empty() {
            GroupedMediaTypes::new(vec![media_type])
        } else {
            GroupedMediaTypes::new(group)
        }
    }

    /// Flat topological (synchronisation) order of the given set.
    #[must_use]
    pub fn media_types_order(&self, media_types: &MediaTypeSet) -> Vec<MediaType> {
        self.inner
            .handlers
            .read()
            .ordered
            .iter()
            .map(|handler| handler.media_type())
            .filter(|mt| media_types.contains(mt))
            .collect()
    }

    /// Partitions a set of media types into dependency-closed ordered
    /// groups, dropping types whose required media types are missing.
    #[must_use]
    pub fn supported_media_types_grouped(
        &self,
        media_types: &MediaTypeSet,
    ) -> Vec<GroupedMediaTypes> {
        let handlers = self.inner.handlers.read();
        let mut assigned = MediaTypeSet::new();
        let mut groups = Vec::new();

        for handler in &handlers.ordered {
            let media_type = handler.media_type();
            if !media_types.contains(&media_type) || assigned.contains(&media_type) {
                continue;
            }

            let mut group: Vec<MediaType> = handler
                .grouped_media_types()
                .into_iter()
                .filter(|mt| media_types.contains(mt))
                .collect();
            if group.is_empty() {
                group.push(media_type);
            }

            // drop members whose required media types are unavailable, and
            // members an earlier group already claimed
            group.retain(|mt| {
                handlers.map.get(mt).is_some_and(|h| {
                    h.required_media_types()
                        .iter()
                        .all(|required| media_types.contains(required))
                })
            });
            group.retain(|mt| !assigned.contains(mt));

            if !group.contains(&media_type) {
                // this type itself is not importable right now
                assigned.insert(media_type);
                continue;
            }

            for mt in &group {
                assigned.insert(*mt);
            }
            groups.push(GroupedMediaTypes::new(group));
        }

        groups
    }

    /// Whether any registered importer can import from the given path.
    #[must_use]
    pub fn can_import(&self, path: &str) -> bool {
        Resolvers(self.inner.clone()).importer_for_path(path).is_some()
    }

    /// Whether an import is registered exactly at the given path.
    pub async fn is_imported(&self, path: &str) -> bool {
        !self
            .inner
            .merged_imports_by_path(path, false)
            .await
            .is_empty()
    }

    pub async fn sources(&self) -> Vec<Source> {
        self.inner.merged_sources(SourceBrowseFilter::All).await
    }

    pub async fn sources_filtered(&self, filter: SourceBrowseFilter) -> Vec<Source> {
        self.inner.merged_sources(filter).await
    }

    pub async fn source(&self, identifier: &str) -> Option<Source> {
        self.inner.merged_source(identifier).await
    }

    #[must_use]
    pub fn is_source_active(&self, identifier: &str) -> bool {
        self.inner
            .sources
            .read()
            .get(identifier)
            .map(|runtime| runtime.active)
            .unwrap_or(false)
    }

    pub async fn imports(&self) -> Vec<Import> {
        self.inner.merged_imports().await
    }

    pub async fn imports_by_source(&self, identifier: &str) -> Vec<Import> {
        self.inner.merged_imports_by_source(identifier).await
    }

    pub async fn imports_by_path(&self, path: &str, include_subdirectories: bool) -> Vec<Import> {
        self.inner
            .merged_imports_by_path(path, include_subdirectories)
            .await
    }

    pub async fn import(&self, path: &str, media_types: &GroupedMediaTypes) -> Option<Import> {
        self.inner.merged_import(path, media_types).await
    }

    // ------------------------------------------------------------------
    // Source lifecycle
    // ------------------------------------------------------------------

    /// Registers a source asynchronously: persists it, emits
    /// `source_added` and, with `activate`, transitions it to active.
    pub fn add_source(&self, mut source: Source, activate: bool, manually_added: bool) -> Result<()> {
        if source.identifier.is_empty() {
            return Err(Error::InvalidInput("source identifier is empty".into()));
        }
        if source.base_path.is_empty() {
            return Err(Error::InvalidInput("source base path is empty".into()));
        }
        if self
            .inner
            .sources
            .read()
            .get(&source.identifier)
            .is_some_and(|runtime| runtime.removing)
        {
            return Err(Error::InvalidInput(format!(
                "source '{}' is being removed",
                source.identifier
            )));
        }

        if source.importer_id.is_empty() {
            source.importer_id = self
                .inner
                .importer_id_for_path(&source.base_path)
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "no importer can handle '{}'",
                        source.base_path
                    ))
                })?;
        }

        let inner = self.inner.clone();
        let submitted = self.inner.source_queue.submit(async move {
            Inner::register_source_job(&inner, source, activate, manually_added).await;
        });
        if !submitted {
            return Err(Error::Internal("source queue is shut down".into()));
        }
        Ok(())
    }

    /// Asynchronously probes readiness and marks the source active.
    pub async fn activate_source(&self, identifier: &str) -> Result<()> {
        let source = self
            .inner
            .merged_source(identifier)
            .await
            .ok_or_else(|| Error::NotFound(format!("source '{identifier}'")))?;
        if self
            .inner
            .sources
            .read()
            .get(identifier)
            .is_some_and(|runtime| runtime.removing)
        {
            return Err(Error::InvalidInput(format!(
                "source '{identifier}' is being removed"
            )));
        }

        Inner::queue_source_activation(&self.inner, source.identifier);
        Ok(())
    }

    /// Deactivates a source: cancels its jobs, hides its imported items
    /// and emits `source_deactivated`. The persisted source stays.
    pub async fn deactivate_source(&self, identifier: &str) -> Result<()> {
        {
            let sources = self.inner.sources.read();
            let runtime = sources
                .get(identifier)
                .ok_or_else(|| Error::NotFound(format!("source '{identifier}'")))?;
            if !runtime.active {
                return Ok(());
            }
        }
        Inner::deactivate_source(&self.inner, identifier).await;
        Ok(())
    }

    /// Persists changed source fields; a real change also refreshes the
    /// readiness flag and emits `source_updated`.
    pub async fn update_source(&self, source: Source) -> Result<()> {
        if source.identifier.is_empty() {
            return Err(Error::InvalidInput("source identifier is empty".into()));
        }

        let mut changed = false;
        for repository in self.inner.repos_snapshot() {
            match repository.update_source(&source).await {
                Ok(updated) => changed |= updated,
                Err(Error::NotFound(_)) => {}
                Err(err) => warn!(%err, "failed to update source"),
            }
        }

        if changed {
            let inner = self.inner.clone();
            let identifier = source.identifier.clone();
            self.inner.source_queue.submit(async move {
                Inner::source_ready_job(&inner, identifier).await;
            });
        }
        Ok(())
    }

    /// Removes a source and everything imported from it. The persisted
    /// rows disappear only after the removal job completed; until then the
    /// source is flagged as removing and refuses new operations.
    pub async fn remove_source(&self, identifier: &str) -> Result<()> {
        let source = self
            .inner
            .merged_source(identifier)
            .await
            .ok_or_else(|| Error::NotFound(format!("source '{identifier}'")))?;

        {
            let mut sources = self.inner.sources.write();
            let runtime = sources.entry(identifier.to_string()).or_default();
            if runtime.removing {
                return Ok(());
            }
            runtime.removing = true;
        }

        self.inner.library_queue.cancel(identifier);

        let imports = self.inner.merged_imports_by_source(identifier).await;
        let ctx = TaskContext::new(self.inner.library_queue.cancel_token(identifier));
        let resolvers = Resolvers(self.inner.clone());
        let job = TaskProcessorJob::remove(identifier, &imports, &resolvers, None, ctx);

        let inner = self.inner.clone();
        let identifier = identifier.to_string();
        self.inner.library_queue.submit(&identifier.clone(), None, async move {
            let success = match job {
                Some(mut job) => job.run().await,
                None => true,
            };
            if !success {
                warn!(source = %identifier, "source removal job failed");
                if let Some(runtime) = inner.sources.write().get_mut(&identifier) {
                    runtime.removing = false;
                }
                return;
            }

            for import in imports {
                for repository in inner.repos_snapshot() {
                    if let Err(err) = repository.remove_import(&import).await {
                        warn!(%err, "failed to remove import");
                    }
                }
                inner.emit(ImportEvent::ImportRemoved(import)).await;
            }

            for repository in inner.repos_snapshot() {
                if let Err(err) = repository.remove_source(&identifier).await {
                    warn!(%err, "failed to remove source");
                }
            }
            inner.emit(ImportEvent::SourceRemoved(source)).await;
            inner.sources.write().remove(&identifier);
        });

        Ok(())
    }

    // ------------------------------------------------------------------
    // Import lifecycle
    // ------------------------------------------------------------------

    /// Registers an import covering exactly `path`.
    pub async fn add_selective_import(
        &self,
        source_identifier: &str,
        path: &str,
        media_types: GroupedMediaTypes,
    ) -> Result<()> {
        self.add_import(source_identifier, path, media_types, false)
            .await
    }

    /// Registers an import covering the subtree below `path`.
    pub async fn add_recursive_import(
        &self,
        source_identifier: &str,
        path: &str,
        media_types: GroupedMediaTypes,
    ) -> Result<()> {
        self.add_import(source_identifier, path, media_types, true)
            .await
    }

    /// Registers several recursive imports of one source at once.
    pub async fn add_recursive_imports(
        &self,
        source_identifier: &str,
        imports: Vec<(String, GroupedMediaTypes)>,
    ) -> Result<()> {
        for (path, media_types) in imports {
            self.add_import(source_identifier, &path, media_types, true)
                .await?;
        }
        Ok(())
    }

    async fn add_import(
        &self,
        source_identifier: &str,
        path: &str,
        media_types: GroupedMediaTypes,
        recursive: bool,
    ) -> Result<()> {
        if path.is_empty() {
            return Err(Error::InvalidInput("import path is empty".into()));
        }
        if media_types.is_empty() {
            return Err(Error::InvalidInput("import has no media types".into()));
        }
        for media_type in media_types.iter() {
            if !self.inner.handler_exists(media_type) {
                return Err(Error::NoHandler(media_type));
            }
        }

        let source = self
            .inner
            .merged_source(source_identifier)
            .await
            .ok_or_else(|| Error::NotFound(format!("source '{source_identifier}'")))?;
        if !is_within_base(&source.base_path, path) {
            return Err(Error::InvalidInput(format!(
                "'{path}' is outside the source base path '{}'",
                source.base_path
            )));
        }

        let import = if recursive {
            Import::recursive(path, media_types, source)
        } else {
            Import::selective(path, media_types, source)
        };

        let mut added = false;
        for repository in self.inner.repos_snapshot() {
            match repository.add_import(&import).await {
                Ok(result) => added |= result,
                Err(err) => warn!(%err, "failed to add import"),
            }
        }

        if added {
            self.inner.emit(ImportEvent::ImportAdded(import)).await;
        }
        Ok(())
    }

    /// Persists changed import fields; emits `import_updated` when any
    /// repository reported a real change.
    pub async fn update_import(&self, import: &Import) -> Result<()> {
        let mut changed = false;
        for repository in self.inner.repos_snapshot() {
            match repository.update_import(import).await {
                Ok(updated) => changed |= updated,
                Err(Error::NotFound(_)) => {}
                Err(err) => warn!(%err, "failed to update import"),
            }
        }

        if changed {
            let mut updated = import.clone_deep();
            self.inner.apply_import_flags(&mut updated);
            self.inner.emit(ImportEvent::ImportUpdated(updated)).await;
        }
        Ok(())
    }

    /// Removes an import: its items leave the library first, then the
    /// registration is deleted and `import_removed` emitted.
    pub async fn remove_import(
        &self,
        path: &str,
        media_types: &GroupedMediaTypes,
    ) -> Result<()> {
        let import = self
            .inner
            .merged_import(path, media_types)
            .await
            .ok_or_else(|| Error::NotFound(format!("import '{path}'")))?;

        let source_identifier = import.source.identifier.clone();
        let ctx = TaskContext::new(self.inner.library_queue.cancel_token(&source_identifier));
        let resolvers = Resolvers(self.inner.clone());
        let mut job = TaskProcessorJob::remove(
            &source_identifier,
            std::slice::from_ref(&import),
            &resolvers,
            None,
            ctx,
        )
        .ok_or_else(|| Error::Internal("failed to assemble removal job".into()))?;

        let identity = job.identity();
        let inner = self.inner.clone();
        self.inner
            .library_queue
            .submit(&source_identifier, Some(identity), async move {
                if !job.run().await {
                    warn!(path = %import.path, "import removal job failed");
                    return;
                }
                for repository in inner.repos_snapshot() {
                    if let Err(err) = repository.remove_import(&import).await {
                        warn!(%err, "failed to remove import");
                    }
                }
                inner.emit(ImportEvent::ImportRemoved(import)).await;
            });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Synchronisation
    // ------------------------------------------------------------------

    /// Imports from every active and ready source.
    pub async fn import_all(&self) {
        let sources = self.inner.merged_sources(SourceBrowseFilter::Active).await;
        for source in sources {
            if let Err(err) = self.import_source(&source.identifier).await {
                debug!(source = %source.identifier, %err, "skipping source");
            }
        }
    }

    /// Imports every import of one source. Requires the source to be
    /// active, ready and not being removed.
    pub async fn import_source(&self, identifier: &str) -> Result<()> {
        self.inner.ensure_importable(identifier)?;

        let imports = self.inner.merged_imports_by_source(identifier).await;
        if imports.is_empty() {
            return Err(Error::NotFound(format!(
                "no imports for source '{identifier}'"
            )));
        }

        for import in imports {
            Inner::submit_import_job(&self.inner, import, false);
        }
        Ok(())
    }

    /// Imports one specific import.
    pub async fn import_path(
        &self,
        path: &str,
        media_types: &GroupedMediaTypes,
    ) -> Result<()> {
        let import = self
            .inner
            .merged_import(path, media_types)
            .await
            .ok_or_else(|| Error::NotFound(format!("import '{path}'")))?;
        self.inner.ensure_importable(&import.source.identifier)?;

        if !Inner::submit_import_job(&self.inner, import, false) {
            return Err(Error::Internal("failed to schedule import".into()));
        }
        Ok(())
    }

    /// Injects pre-classified items as a partial changeset.
    pub async fn change_imported_items(
        &self,
        import: &Import,
        items: ChangesetItems,
    ) -> Result<()> {
        let authoritative = self
            .inner
            .merged_import(&import.path, &import.media_types)
            .await
            .ok_or_else(|| Error::NotFound(format!("import '{}'", import.path)))?;
        self.inner
            .ensure_importable(&authoritative.source.identifier)?;

        let supported = self.supported_media_types();
        let filtered: ChangesetItems = items
            .into_iter()
            .filter(|entry| {
                authoritative.contains_media_type(entry.item.media_type)
                    && supported.contains(&entry.item.media_type)
            })
            .collect();
        if filtered.is_empty() {
            return Err(Error::InvalidInput(
                "no items match the import's media types".into(),
            ));
        }

        let source_identifier = authoritative.source.identifier.clone();
        let ctx = TaskContext::new(self.inner.library_queue.cancel_token(&source_identifier));
        let resolvers = Resolvers(self.inner.clone());
        let mut job = TaskProcessorJob::change_imported_items(
            &authoritative,
            filtered,
            &resolvers,
            None,
            ctx,
        )
        .ok_or_else(|| Error::Internal("failed to assemble changeset job".into()))?;

        let identity = job.identity();
        let inner = self.inner.clone();
        self.inner
            .library_queue
            .submit(&source_identifier, Some(identity), async move {
                Inner::run_and_finalize_import_job(&inner, &mut job).await;
            });
        Ok(())
    }

    pub async fn add_imported_items(
        &self,
        import: &Import,
        items: Vec<MediaItem>,
    ) -> Result<()> {
        self.change_imported_items(import, classify(items, ChangesetType::Added))
            .await
    }

    pub async fn update_imported_items(
        &self,
        import: &Import,
        items: Vec<MediaItem>,
    ) -> Result<()> {
        self.change_imported_items(import, classify(items, ChangesetType::Changed))
            .await
    }

    pub async fn remove_imported_items(
        &self,
        import: &Import,
        items: Vec<MediaItem>,
    ) -> Result<()> {
        self.change_imported_items(import, classify(items, ChangesetType::Removed))
            .await
    }

    /// Pushes one item's playback metadata back to its source, if the
    /// import allows it and the source is active.
    pub async fn update_imported_item_on_source(&self, item: MediaItem) -> Result<()> {
        if item.import_path.is_empty() {
            return Err(Error::InvalidInput("item was not imported".into()));
        }

        let imports = self
            .inner
            .merged_imports_by_path(&item.import_path, false)
            .await;
        let import = imports
            .into_iter()
            .find(|import| import.contains_media_type(item.media_type))
            .ok_or_else(|| {
                Error::NotFound(format!("import '{}'", item.import_path))
            })?;

        if !import.settings.update_playback_metadata_on_source() {
            debug!(path = %item.path, "playback updates on source are disabled");
            return Ok(());
        }
        self.inner.ensure_importable(&import.source.identifier)?;

        let source_identifier = import.source.identifier.clone();
        let ctx = TaskContext::new(self.inner.library_queue.cancel_token(&source_identifier));
        let resolvers = Resolvers(self.inner.clone());
        let mut job = TaskProcessorJob::update_imported_item_on_source(
            &import,
            item,
            &resolvers,
            None,
            ctx,
        )
        .ok_or_else(|| Error::Internal("failed to assemble update job".into()))?;

        self.inner
            .library_queue
            .submit(&source_identifier, None, async move {
                job.run().await;
            });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Adapter settings passthrough
    // ------------------------------------------------------------------

    pub async fn load_source_settings(&self, source: &mut Source) -> bool {
        match Resolvers(self.inner.clone()).importer_for_source(source) {
            Some(importer) => importer.load_source_settings(source).await,
            None => false,
        }
    }

    pub async fn unload_source_settings(&self, source: &mut Source) -> bool {
        match Resolvers(self.inner.clone()).importer_for_source(source) {
            Some(importer) => importer.unload_source_settings(source).await,
            None => false,
        }
    }

    pub async fn load_import_settings(&self, import: &mut Import) -> bool {
        match Resolvers(self.inner.clone()).importer_for_source(&import.source) {
            Some(importer) => importer.load_import_settings(import).await,
            None => false,
        }
    }

    pub async fn unload_import_settings(&self, import: &mut Import) -> bool {
        match Resolvers(self.inner.clone()).importer_for_source(&import.source) {
            Some(importer) => importer.unload_import_settings(import).await,
            None => false,
        }
    }
}

fn classify(items: Vec<MediaItem>, changeset: ChangesetType) -> ChangesetItems {
    items
        .into_iter()
        .map(|item| ChangesetItem::new(changeset, item))
        .collect()
}
