//! Internal manager plumbing: repository merging, event routing and the
//! asynchronous source jobs (registration, activation, readiness).

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::importer::{Importer, ImporterResolver};
use crate::media_type::{GroupedMediaTypes, MediaType};
use crate::models::{Import, ImportKey, Source};
use crate::paths::SourceBrowseFilter;
use crate::repository::ImportRepository;
use crate::task::{TaskContext, TaskProcessorJob};
use crate::Error;

use super::{ImportEvent, Inner, Resolvers, SourceRuntime};

impl Inner {
    pub(crate) fn repos_snapshot(&self) -> Vec<Arc<dyn ImportRepository>> {
        self.repositories.read().clone()
    }

    pub(crate) fn runtime_flags(&self, identifier: &str) -> Option<SourceRuntime> {
        self.sources.read().get(identifier).cloned()
    }

    pub(crate) fn handler_exists(&self, media_type: MediaType) -> bool {
        self.handlers.read().map.contains_key(&media_type)
    }

    pub(crate) fn create_importer_by_id(&self, importer_id: &str) -> Option<Arc<dyn Importer>> {
        let importers = self.importers.read();
        let registration = importers.get(importer_id)?;
        Some(Arc::from(registration.factory.create_importer()))
    }

    /// The id of the first registered importer that can import from the
    /// given path.
    pub(crate) fn importer_id_for_path(&self, path: &str) -> Option<String> {
        let importers = self.importers.read();
        for (id, registration) in importers.iter() {
            let importer = registration.factory.create_importer();
            if importer.can_import(path) {
                return Some(id.clone());
            }
        }
        None
    }

    pub(crate) fn apply_source_flags(&self, source: &mut Source) {
        let sources = self.sources.read();
        if let Some(runtime) = sources.get(&source.identifier) {
            source.active = runtime.active;
            source.ready = runtime.ready;
            if source.importer_id.is_empty() {
                source.importer_id = runtime.importer_id.clone();
            }
        }
    }

    pub(crate) fn apply_import_flags(&self, import: &mut Import) {
        self.apply_source_flags(&mut import.source);
    }

    /// Fails unless the source is active, ready and not being removed.
    pub(crate) fn ensure_importable(&self, identifier: &str) -> crate::Result<()> {
        let sources = self.sources.read();
        let runtime = sources
            .get(identifier)
            .ok_or_else(|| Error::NotFound(format!("source '{identifier}'")))?;
        if runtime.removing {
            return Err(Error::InvalidInput(format!(
                "source '{identifier}' is being removed"
            )));
        }
        if !runtime.active || !runtime.ready {
            return Err(Error::InvalidInput(format!(
                "source '{identifier}' is not active and ready"
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Repository merging
    // ------------------------------------------------------------------

    pub(crate) async fn merged_source(&self, identifier: &str) -> Option<Source> {
        let mut merged: Option<Source> = None;
        for repository in self.repos_snapshot() {
            match repository.source(identifier).await {
                Ok(Some(source)) => match &mut merged {
                    None => merged = Some(source),
                    Some(existing) => existing.merge(&source),
                },
                Ok(None) => {}
                Err(err) => warn!(%err, "failed to read source"),
            }
        }
        if let Some(source) = &mut merged {
            self.apply_source_flags(source);
        }
        merged
    }

    pub(crate) async fn merged_sources_all(&self) -> Vec<Source> {
        self.merged_sources(SourceBrowseFilter::All).await
    }

    pub(crate) async fn merged_sources(&self, filter: SourceBrowseFilter) -> Vec<Source> {
        let mut merged: HashMap<String, Source> = HashMap::new();
        for repository in self.repos_snapshot() {
            match repository.sources().await {
                Ok(sources) => {
                    for source in sources {
                        match merged.entry(source.identifier.clone()) {
                            Entry::Occupied(mut entry) => entry.get_mut().merge(&source),
                            Entry::Vacant(entry) => {
                                entry.insert(source);
                            }
                        }
                    }
                }
                Err(err) => warn!(%err, "failed to read sources"),
            }
        }

        let mut sources: Vec<Source> = merged.into_values().collect();
        for source in &mut sources {
            self.apply_source_flags(source);
        }
        match filter {
            SourceBrowseFilter::All => {}
            SourceBrowseFilter::Active => sources.retain(|source| source.active),
            SourceBrowseFilter::Inactive => sources.retain(|source| !source.active),
        }
        sources.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        sources
    }

    fn merge_import_lists(&self, lists: Vec<Vec<Import>>) -> Vec<Import> {
        let mut merged: HashMap<ImportKey, Import> = HashMap::new();
        for import in lists.into_iter().flatten() {
            match merged.entry(import.key()) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    if import.last_synced > existing.last_synced {
                        existing.last_synced = import.last_synced;
                    }
                    existing.source.merge(&import.source);
                }
                Entry::Vacant(entry) => {
                    entry.insert(import);
                }
            }
        }

        let mut imports: Vec<Import> = merged.into_values().collect();
        for import in &mut imports {
            self.apply_import_flags(import);
        }
        imports.sort_by(|a, b| a.key().cmp(&b.key()));
        imports
    }

    pub(crate) async fn merged_imports(&self) -> Vec<Import> {
        let mut lists = Vec::new();
        for repository in self.repos_snapshot() {
            match repository.imports().await {
                Ok(imports) => lists.push(imports),
                Err(err) => warn!(%err, "failed to read imports"),
            }
        }
        self.merge_import_lists(lists)
    }

    pub(crate) async fn merged_imports_by_source(&self, identifier: &str) -> Vec<Import> {
        let mut lists = Vec::new();
        for repository in self.repos_snapshot() {
            match repository.imports_by_source(identifier).await {
                Ok(imports) => lists.push(imports),
                Err(err) => warn!(%err, "failed to read imports"),
            }
        }
        self.merge_import_lists(lists)
    }

    pub(crate) async fn merged_imports_by_path(
        &self,
        path: &str,
        include_subdirectories: bool,
    ) -> Vec<Import> {
        let mut lists = Vec::new();
        for repository in self.repos_snapshot() {
            match repository.imports_by_path(path, include_subdirectories).await {
                Ok(imports) => lists.push(imports),
                Err(err) => warn!(%err, "failed to read imports"),
            }
        }
        self.merge_import_lists(lists)
    }

    pub(crate) async fn merged_import(
        &self,
        path: &str,
        media_types: &GroupedMediaTypes,
    ) -> Option<Import> {
        let mut lists = Vec::new();
        for repository in self.repos_snapshot() {
            match repository.import(path, media_types).await {
                Ok(Some(import)) => lists.push(vec![import]),
                Ok(None) => {}
                Err(err) => warn!(%err, "failed to read import"),
            }
        }
        self.merge_import_lists(lists).into_iter().next()
    }

    // ------------------------------------------------------------------
    // Event routing
    // ------------------------------------------------------------------

    /// Delivers an event to the per-source observer and the broadcast
    /// feed.
    pub(crate) async fn emit(&self, event: ImportEvent) {
        let observer = {
            let identifier = event.source_identifier().to_string();
            let importer_id = self
                .sources
                .read()
                .get(&identifier)
                .map(|runtime| runtime.importer_id.clone());
            importer_id.and_then(|id| {
                self.importers
                    .read()
                    .get(&id)
                    .and_then(|registration| registration.observer.clone())
            })
        };

        if let Some(observer) = observer {
            match &event {
                ImportEvent::SourceAdded(source) => observer.on_source_added(source).await,
                ImportEvent::SourceUpdated(source) => observer.on_source_updated(source).await,
                ImportEvent::SourceRemoved(source) => observer.on_source_removed(source).await,
                ImportEvent::SourceActivated(source) => {
                    observer.on_source_activated(source).await;
                }
                ImportEvent::SourceDeactivated(source) => {
                    observer.on_source_deactivated(source).await;
                }
                ImportEvent::ImportAdded(import) => observer.on_import_added(import).await,
                ImportEvent::ImportUpdated(import) => observer.on_import_updated(import).await,
                ImportEvent::ImportRemoved(import) => observer.on_import_removed(import).await,
            }
        }

        debug!(event = event.name(), source = event.source_identifier(), "lifecycle event");
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Source jobs (run on the single-worker source queue)
    // ------------------------------------------------------------------

    pub(crate) async fn register_source_job(
        inner: &Arc<Inner>,
        mut source: Source,
        activate: bool,
        manually_added: bool,
    ) {
        source.manually_added = manually_added;

        let mut persisted = false;
        let mut added = false;
        for repository in inner.repos_snapshot() {
            match repository.add_source(&source).await {
                Ok(result) => {
                    persisted = true;
                    added |= result;
                }
                Err(err) => warn!(%err, "failed to persist source"),
            }
        }
        if !persisted {
            error!(source = %source.identifier, "no repository accepted the source");
            return;
        }

        {
            let mut sources = inner.sources.write();
            let runtime = sources.entry(source.identifier.clone()).or_default();
            runtime.importer_id = source.importer_id.clone();
        }

        if added {
            info!(source = %source.identifier, "source registered");
            let mut announced = source.clone_deep();
            inner.apply_source_flags(&mut announced);
            inner.emit(ImportEvent::SourceAdded(announced)).await;
        }

        if activate {
            Inner::activate_source_job(inner, source.identifier).await;
        }
    }

    pub(crate) fn queue_source_activation(inner: &Arc<Inner>, identifier: String) {
        let job_inner = inner.clone();
        inner.source_queue.submit(async move {
            Inner::activate_source_job(&job_inner, identifier).await;
        });
    }

    pub(crate) async fn activate_source_job(inner: &Arc<Inner>, identifier: String) {
        let Some(mut source) = inner.merged_source(&identifier).await else {
            warn!(source = %identifier, "cannot activate unknown source");
            return;
        };
        if inner
            .runtime_flags(&identifier)
            .is_some_and(|runtime| runtime.removing)
        {
            return;
        }

        let Some(importer) = Resolvers(inner.clone()).importer_for_source(&source) else {
            warn!(source = %identifier, "no importer for source");
            return;
        };

        let ready = importer.is_source_ready(&mut source).await;

        // the readiness probe may have refreshed source fields
        let mut updated = false;
        for repository in inner.repos_snapshot() {
            match repository.update_source(&source).await {
                Ok(result) => updated |= result,
                Err(Error::NotFound(_)) => {}
                Err(err) => warn!(%err, "failed to update source"),
            }
        }

        {
            let mut sources = inner.sources.write();
            let runtime = sources.entry(identifier.clone()).or_default();
            if runtime.importer_id.is_empty() {
                runtime.importer_id = source.importer_id.clone();
            }
            runtime.active = true;
            runtime.ready = ready;
        }
        source.active = true;
        source.ready = ready;

        // items hidden by an earlier deactivation become visible again
        Inner::set_source_items_enabled(inner, &identifier, true).await;

        info!(source = %identifier, ready, "source activated");
        if updated {
            inner.emit(ImportEvent::SourceUpdated(source.clone_deep())).await;
        }
        inner.emit(ImportEvent::SourceActivated(source)).await;

        if ready {
            Inner::schedule_source_imports(inner, &identifier, true).await;
        }
    }

    /// Shows or hides everything imported from one source.
    pub(crate) async fn set_source_items_enabled(
        inner: &Arc<Inner>,
        identifier: &str,
        enabled: bool,
    ) {
        let imports = inner.merged_imports_by_source(identifier).await;
        let handlers = {
            let registry = inner.handlers.read();
            registry.ordered.clone()
        };
        for import in &imports {
            for handler in &handlers {
                if !import.contains_media_type(handler.media_type()) {
                    continue;
                }
                if let Err(err) = handler.set_imported_items_enabled(import, enabled).await {
                    warn!(%err, "failed to toggle imported items");
                }
            }
        }
    }

    /// Refreshes the readiness flag after a source update.
    pub(crate) async fn source_ready_job(inner: &Arc<Inner>, identifier: String) {
        let Some(mut source) = inner.merged_source(&identifier).await else {
            return;
        };
        let Some(runtime) = inner.runtime_flags(&identifier) else {
            return;
        };
        if runtime.removing {
            return;
        }

        if runtime.active {
            if let Some(importer) = Resolvers(inner.clone()).importer_for_source(&source) {
                let ready = importer.is_source_ready(&mut source).await;
                if let Some(entry) = inner.sources.write().get_mut(&identifier) {
                    entry.ready = ready;
                }
                source.ready = ready;
            }
        }

        inner.emit(ImportEvent::SourceUpdated(source)).await;
    }

    /// Synchronous half of a deactivation; called from the public API and
    /// the heartbeat.
    pub(crate) async fn deactivate_source(inner: &Arc<Inner>, identifier: &str) {
        {
            let mut sources = inner.sources.write();
            let Some(runtime) = sources.get_mut(identifier) else {
                return;
            };
            runtime.active = false;
            runtime.ready = false;
        }

        inner.library_queue.cancel(identifier);

        Inner::set_source_items_enabled(inner, identifier, false).await;

        if let Some(source) = inner.merged_source(identifier).await {
            info!(source = %identifier, "source deactivated");
            inner.emit(ImportEvent::SourceDeactivated(source)).await;
        }
    }

    /// Queues task-processor import jobs for every import of a source.
    pub(crate) async fn schedule_source_imports(
        inner: &Arc<Inner>,
        identifier: &str,
        automatically: bool,
    ) {
        let imports = inner.merged_imports_by_source(identifier).await;
        for import in imports {
            Inner::submit_import_job(inner, import, automatically);
        }
    }

    /// Builds and enqueues one task-processor import job.
    pub(crate) fn submit_import_job(
        inner: &Arc<Inner>,
        import: Import,
        automatically: bool,
    ) -> bool {
        let source_identifier = import.source.identifier.clone();
        let ctx = TaskContext::new(inner.library_queue.cancel_token(&source_identifier));
        let resolvers = Arc::new(Resolvers(inner.clone()));

        let Some(mut job) = TaskProcessorJob::import(
            &import,
            automatically,
            resolvers.clone(),
            resolvers.as_ref(),
            None,
            ctx,
        ) else {
            return false;
        };

        let identity = job.identity();
        let job_inner = inner.clone();
        inner
            .library_queue
            .submit(&source_identifier, Some(identity), async move {
                Inner::run_and_finalize_import_job(&job_inner, &mut job).await;
            })
    }

    /// Runs an import-like job and finalizes the synchronised imports:
    /// stamps `last_synced` and emits `import_updated` once per import.
    pub(crate) async fn run_and_finalize_import_job(
        inner: &Arc<Inner>,
        job: &mut TaskProcessorJob,
    ) {
        let success = job.run().await;
        if !success {
            debug!(source = %job.source(), "import job finished with failures");
        }

        let when = Utc::now();
        for mut import in job.synchronised_imports() {
            for repository in inner.repos_snapshot() {
                if let Err(err) = repository.update_last_sync(&import, when).await {
                    warn!(%err, "failed to update last sync");
                }
            }
            import.mark_synced(when);
            inner.apply_import_flags(&mut import);
            inner.emit(ImportEvent::ImportUpdated(import)).await;
        }
    }
}
