//! The task processor: runs the ordered task pipeline for one or more
//! imports of a single source.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::handler::{HandlerResolver, MediaTypeHandler};
use crate::importer::ImporterResolver;
use crate::media_type::MediaType;
use crate::models::{ChangesetItems, Import, ImportKey, MediaItem};
use crate::settings::ImportTrigger;

use super::{
    ChangesetTask, CleanupTask, ImportItemsRetrievalTask, ImportTask, LocalItemsRetrievalTask,
    ProgressHandle, RemovalTask, SynchronisationTask, TaskCallback, TaskContext, TaskType,
    UpdateTask,
};

/// Per-media-type state of one import inside a job.
struct MediaTypeData {
    media_type: MediaType,
    /// Registered prototype; per-task instances come from
    /// [`MediaTypeHandler::create`].
    handler: Arc<dyn MediaTypeHandler>,
    local_items: Vec<MediaItem>,
    imported_items: ChangesetItems,
}

/// State of one import inside a job.
struct ImportTaskData {
    import: Import,
    partial_changeset: bool,
    /// Every synchronisation task of this import succeeded.
    synchronised: bool,
    media_type_data: Vec<MediaTypeData>,
}

/// Identity of a job inside the queue, used to drop exact duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobIdentity {
    pub source: String,
    pub task_types: Vec<TaskType>,
    pub imports: Vec<ImportKey>,
}

/// A background job executing an ordered list of task types over the
/// imports it was assembled for. Assembled through the factory
/// constructors, which validate their inputs and return `None` instead of
/// a partially usable job.
pub struct TaskProcessorJob {
    id: Uuid,
    source: String,
    importer_resolver: Option<Arc<dyn ImporterResolver>>,
    callback: Option<Arc<dyn TaskCallback>>,
    ctx: TaskContext,
    import_task_data: IndexMap<ImportKey, ImportTaskData>,
    task_types: Vec<TaskType>,
    update_task: Option<UpdateTask>,
}

impl TaskProcessorJob {
    fn new(
        source: String,
        importer_resolver: Option<Arc<dyn ImporterResolver>>,
        callback: Option<Arc<dyn TaskCallback>>,
        ctx: TaskContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            importer_resolver,
            callback,
            ctx,
            import_task_data: IndexMap::new(),
            task_types: Vec::new(),
            update_task: None,
        }
    }

    /// Unique id of this job, for log correlation.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// A full import cycle for one import.
    ///
    /// With `automatically` set, imports whose trigger is `manual` are
    /// skipped (returns `None`).
    pub fn import(
        import: &Import,
        automatically: bool,
        importer_resolver: Arc<dyn ImporterResolver>,
        handler_resolver: &dyn HandlerResolver,
        callback: Option<Arc<dyn TaskCallback>>,
        ctx: TaskContext,
    ) -> Option<Self> {
        if automatically && import.settings.import_trigger() != ImportTrigger::Auto {
            debug!(path = %import.path, "automatic import is disabled");
            return None;
        }

        let mut job = Self::new(
            import.source.identifier.clone(),
            Some(importer_resolver),
            callback,
            ctx,
        );
        if !job.add_import(import.clone(), Vec::new(), handler_resolver) {
            warn!(path = %import.path, "failed to assemble import job");
            return None;
        }
        Some(job)
    }

    /// Injects caller-classified items as a partial changeset: local
    /// retrieval, changeset, synchronisation — no cleanup.
    pub fn change_imported_items(
        import: &Import,
        items: ChangesetItems,
        handler_resolver: &dyn HandlerResolver,
        callback: Option<Arc<dyn TaskCallback>>,
        ctx: TaskContext,
    ) -> Option<Self> {
        let mut data = ImportTaskData {
            import: import.clone(),
            partial_changeset: true,
            synchronised: false,
            media_type_data: Vec::new(),
        };
        for media_type in import.media_types.iter() {
            let Some(handler) = handler_resolver.handler_for(media_type) else {
                continue;
            };
            data.media_type_data.push(MediaTypeData {
                media_type,
                handler,
                local_items: Vec::new(),
                imported_items: ChangesetItems::new(),
            });
        }

        for entry in items {
            let bucket = data
                .media_type_data
                .iter_mut()
                .find(|mtd| mtd.media_type == entry.item.media_type);
            if let Some(bucket) = bucket {
                bucket.imported_items.push(entry);
            }
        }

        data.media_type_data
            .retain(|mtd| !mtd.imported_items.is_empty());
        if data.media_type_data.is_empty() {
            return None;
        }

        let mut job = Self::new(import.source.identifier.clone(), None, callback, ctx);
        job.import_task_data.insert(import.key(), data);
        job.task_types = vec![
            TaskType::LocalItemsRetrieval,
            TaskType::Changeset,
            TaskType::Synchronisation,
        ];
        Some(job)
    }

    /// Pushes one item's playback metadata back to the source.
    pub fn update_imported_item_on_source(
        import: &Import,
        item: MediaItem,
        importer_resolver: &dyn ImporterResolver,
        callback: Option<Arc<dyn TaskCallback>>,
        ctx: TaskContext,
    ) -> Option<Self> {
        let Some(importer) = importer_resolver.importer_for_source(&import.source) else {
            error!(
                source = %import.source.identifier,
                "no importer available for update on source"
            );
            return None;
        };

        let mut job = Self::new(import.source.identifier.clone(), None, callback, ctx);
        job.update_task = Some(UpdateTask::new(
            import.clone(),
            item,
            importer,
            job.ctx.clone(),
        ));
        job.task_types = vec![TaskType::Update];
        Some(job)
    }

    /// Cleanup-only flow over a set of imports.
    pub fn cleanup(
        source: &str,
        imports: &[Import],
        handler_resolver: &dyn HandlerResolver,
        callback: Option<Arc<dyn TaskCallback>>,
        ctx: TaskContext,
    ) -> Option<Self> {
        if imports.is_empty() {
            return None;
        }

        let mut job = Self::new(source.to_string(), None, callback, ctx);
        let mut added = false;
        for import in imports {
            if !job.add_import(import.clone(), vec![TaskType::Cleanup], handler_resolver) {
                warn!(path = %import.path, "failed to add import to cleanup job");
                continue;
            }
            added = true;
        }

        added.then_some(job)
    }

    /// Removal-only flow over a set of imports.
    pub fn remove(
        source: &str,
        imports: &[Import],
        handler_resolver: &dyn HandlerResolver,
        callback: Option<Arc<dyn TaskCallback>>,
        ctx: TaskContext,
    ) -> Option<Self> {
        if imports.is_empty() {
            return None;
        }

        let mut job = Self::new(source.to_string(), None, callback, ctx);
        let mut added = false;
        for import in imports {
            if !job.add_import(import.clone(), vec![TaskType::Removal], handler_resolver) {
                warn!(path = %import.path, "failed to add import to removal job");
                continue;
            }
            added = true;
        }

        added.then_some(job)
    }

    /// The source this job belongs to (jobs of one source run serially).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn progress(&self) -> ProgressHandle {
        self.ctx.progress().clone()
    }

    /// The imports currently part of this job.
    #[must_use]
    pub fn imports(&self) -> Vec<Import> {
        self.import_task_data
            .values()
            .map(|data| data.import.clone())
            .collect()
    }

    /// The imports whose synchronisation pass completed without failures.
    #[must_use]
    pub fn synchronised_imports(&self) -> Vec<Import> {
        self.import_task_data
            .values()
            .filter(|data| data.synchronised)
            .map(|data| data.import.clone())
            .collect()
    }

    /// Identity for duplicate suppression in the queue.
    #[must_use]
    pub fn identity(&self) -> JobIdentity {
        JobIdentity {
            source: self.source.clone(),
            task_types: self.task_types.clone(),
            imports: self.import_task_data.keys().cloned().collect(),
        }
    }

    /// Registers an import and merges its task list into the job's
    /// schedule: task types already queued keep their position, missing
    /// ones are inserted at the earliest slot that preserves the relative
    /// order of the requested list.
    fn add_import(
        &mut self,
        import: Import,
        task_types: Vec<TaskType>,
        handler_resolver: &dyn HandlerResolver,
    ) -> bool {
        if self.import_task_data.contains_key(&import.key()) {
            return false;
        }

        let mut media_type_data = Vec::new();
        for media_type in import.media_types.iter() {
            let Some(handler) = handler_resolver.handler_for(media_type) else {
                error!(%media_type, "no handler registered");
                return false;
            };
            media_type_data.push(MediaTypeData {
                media_type,
                handler,
                local_items: Vec::new(),
                imported_items: ChangesetItems::new(),
            });
        }

        self.import_task_data.insert(
            import.key(),
            ImportTaskData {
                import,
                partial_changeset: false,
                synchronised: false,
                media_type_data,
            },
        );

        let task_types = if task_types.is_empty() {
            vec![
                TaskType::LocalItemsRetrieval,
                TaskType::ImportItemsRetrieval,
                TaskType::Changeset,
                TaskType::Synchronisation,
                TaskType::Cleanup,
            ]
        } else {
            task_types
        };

        if self.task_types.is_empty() {
            self.task_types = task_types;
        } else {
            let mut start_index = 0;
            for new_task in task_types {
                match self.task_types[start_index..]
                    .iter()
                    .position(|t| *t == new_task)
                {
                    Some(offset) => start_index += offset,
                    None => {
                        self.task_types.insert(start_index, new_task);
                        start_index += 1;
                    }
                }
            }
        }

        true
    }

    /// Runs a task, measures it, and reports it to the callback.
    async fn process_task(
        callback: Option<Arc<dyn TaskCallback>>,
        task: &mut dyn ImportTask,
    ) -> bool {
        let task_type = task.task_type();
        let path = task.import().path.clone();
        debug!(task = %task_type, %path, "processing task");

        let started = Instant::now();
        let success = match task.run().await {
            Ok(()) => true,
            Err(err) => {
                debug!(task = %task_type, %path, %err, "task failed");
                false
            }
        };

        let callback_ok = match callback {
            Some(callback) => {
                callback
                    .on_task_complete(success, task_type, task.import())
                    .await
            }
            None => true,
        };

        debug!(
            task = %task_type,
            %path,
            elapsed = ?started.elapsed(),
            "processed task"
        );

        success && callback_ok
    }

    /// Executes the job. Returns whether every task succeeded.
    pub async fn run(&mut self) -> bool {
        debug!(job = %self.id, source = %self.source, "running processor job");
        if let Some(mut task) = self.update_task.take() {
            return Self::process_task(self.callback.clone(), &mut task).await;
        }

        let mut success = true;
        while !self.task_types.is_empty() {
            if self.ctx.is_cancelled() {
                return false;
            }
            if self.import_task_data.is_empty() {
                break;
            }

            let current = self.task_types.remove(0);
            success &= match current {
                TaskType::LocalItemsRetrieval => self.process_local_items_retrieval().await,
                TaskType::ImportItemsRetrieval => self.process_import_items_retrieval().await,
                TaskType::Changeset => self.process_changeset().await,
                TaskType::Synchronisation => self.process_synchronisation().await,
                TaskType::Cleanup => self.process_cleanup().await,
                TaskType::Removal => self.process_removal().await,
                TaskType::Update => {
                    warn!("update task type without an update task");
                    false
                }
            };

            if self.ctx.is_cancelled() {
                return false;
            }
        }

        success
    }

    async fn process_local_items_retrieval(&mut self) -> bool {
        let mut all_ok = true;
        let keys: Vec<ImportKey> = self.import_task_data.keys().cloned().collect();
        for key in keys {
            if self.ctx.is_cancelled() {
                return false;
            }

            let Some(data) = self.import_task_data.get(&key) else {
                continue;
            };
            let import = data.import.clone();
            let handlers: Vec<(MediaType, Box<dyn MediaTypeHandler>)> = data
                .media_type_data
                .iter()
                .map(|mtd| (mtd.media_type, mtd.handler.create()))
                .collect();

            info!(path = %import.path, "starting local items retrieval");
            let mut task = LocalItemsRetrievalTask::new(import, handlers, self.ctx.clone());
            if !Self::process_task(self.callback.clone(), &mut task).await {
                error!(path = %key.0, "local items retrieval failed");
                self.import_task_data.shift_remove(&key);
                all_ok = false;
                continue;
            }

            if let Some(data) = self.import_task_data.get_mut(&key) {
                for mtd in &mut data.media_type_data {
                    mtd.local_items = task.take_local_items(mtd.media_type);
                }
            }
        }
        all_ok
    }

    async fn process_import_items_retrieval(&mut self) -> bool {
        let Some(importer_resolver) = self.importer_resolver.clone() else {
            error!("no importer resolver available");
            return false;
        };

        let mut all_ok = true;
        let keys: Vec<ImportKey> = self.import_task_data.keys().cloned().collect();
        for key in keys {
            if self.ctx.is_cancelled() {
                return false;
            }

            let import = match self.import_task_data.get(&key) {
                Some(data) => data.import.clone(),
                None => continue,
            };

            let Some(importer) = importer_resolver.importer_for_source(&import.source) else {
                warn!(
                    source = %import.source.identifier,
                    "no importer for source, skipping import"
                );
                self.import_task_data.shift_remove(&key);
                all_ok = false;
                continue;
            };

            let mut task =
                ImportItemsRetrievalTask::new(import.clone(), importer, self.ctx.clone());
            if let Some(data) = self.import_task_data.get_mut(&key) {
                for mtd in &mut data.media_type_data {
                    task.set_local_items(std::mem::take(&mut mtd.local_items), mtd.media_type);
                }
            }

            info!(path = %import.path, "starting import items retrieval");
            if !Self::process_task(self.callback.clone(), &mut task).await {
                warn!(path = %import.path, "import items retrieval failed");
                self.import_task_data.shift_remove(&key);
                all_ok = false;
                continue;
            }

            if let Some(data) = self.import_task_data.get_mut(&key) {
                // the importer may have refreshed source-provided fields
                data.import = task.import_mut().clone();
                data.partial_changeset = task.is_changeset();
                for mtd in &mut data.media_type_data {
                    mtd.local_items = task.local_items(mtd.media_type).to_vec();
                    mtd.imported_items = task.take_retrieved_items(mtd.media_type);
                }
            }
        }
        all_ok
    }

    async fn process_changeset(&mut self) -> bool {
        let mut all_ok = true;
        let keys: Vec<ImportKey> = self.import_task_data.keys().cloned().collect();
        for key in keys {
            let (import, partial, media_data) = {
                let Some(data) = self.import_task_data.get_mut(&key) else {
                    continue;
                };
                (
                    data.import.clone(),
                    data.partial_changeset,
                    std::mem::take(&mut data.media_type_data),
                )
            };

            let mut kept = Vec::with_capacity(media_data.len());
            for mut mtd in media_data {
                if self.ctx.is_cancelled() {
                    return false;
                }

                info!(
                    media_type = %mtd.media_type,
                    path = %import.path,
                    "starting changeset task"
                );
                let mut task = ChangesetTask::new(
                    import.clone(),
                    mtd.handler.create(),
                    std::mem::take(&mut mtd.local_items),
                    std::mem::take(&mut mtd.imported_items),
                    partial,
                    self.ctx.clone(),
                );
                if !Self::process_task(self.callback.clone(), &mut task).await {
                    warn!(
                        media_type = %mtd.media_type,
                        path = %import.path,
                        "changeset task failed"
                    );
                    all_ok = false;
                    continue;
                }

                mtd.imported_items = task.take_changeset();
                if mtd.imported_items.is_empty() {
                    debug!(
                        media_type = %mtd.media_type,
                        path = %import.path,
                        "no items changed"
                    );
                }
                kept.push(mtd);
            }

            if let Some(data) = self.import_task_data.get_mut(&key) {
                data.media_type_data = kept;
            }
        }
        all_ok
    }

    async fn process_synchronisation(&mut self) -> bool {
        let mut all_ok = true;
        let keys: Vec<ImportKey> = self.import_task_data.keys().cloned().collect();
        for key in keys {
            let (import, media_data) = {
                let Some(data) = self.import_task_data.get_mut(&key) else {
                    continue;
                };
                (
                    data.import.clone(),
                    std::mem::take(&mut data.media_type_data),
                )
            };

            let mut kept = Vec::with_capacity(media_data.len());
            let mut import_ok = true;
            for mut mtd in media_data {
                if self.ctx.is_cancelled() {
                    return false;
                }

                info!(
                    media_type = %mtd.media_type,
                    path = %import.path,
                    "starting synchronisation task"
                );
                let mut task = SynchronisationTask::new(
                    import.clone(),
                    mtd.handler.create(),
                    std::mem::take(&mut mtd.imported_items),
                    self.ctx.clone(),
                );
                if !Self::process_task(self.callback.clone(), &mut task).await {
                    // keep the import so cleanup still runs
                    warn!(
                        media_type = %mtd.media_type,
                        path = %import.path,
                        "synchronisation task failed"
                    );
                    all_ok = false;
                    import_ok = false;
                }
                kept.push(mtd);
            }

            if let Some(data) = self.import_task_data.get_mut(&key) {
                data.media_type_data = kept;
                data.synchronised = import_ok;
            }
        }
        all_ok
    }

    async fn process_cleanup(&mut self) -> bool {
        self.process_reverse_stage(TaskType::Cleanup).await
    }

    async fn process_removal(&mut self) -> bool {
        self.process_reverse_stage(TaskType::Removal).await
    }

    /// Cleanup and removal walk the media types in reverse dependency
    /// order so children go before their containers.
    async fn process_reverse_stage(&mut self, stage: TaskType) -> bool {
        let mut all_ok = true;
        let keys: Vec<ImportKey> = self.import_task_data.keys().cloned().collect();
        for key in keys {
            let (import, media_data) = {
                let Some(data) = self.import_task_data.get_mut(&key) else {
                    continue;
                };
                (
                    data.import.clone(),
                    std::mem::take(&mut data.media_type_data),
                )
            };

            let mut kept = Vec::with_capacity(media_data.len());
            for mtd in media_data.into_iter().rev() {
                if self.ctx.is_cancelled() {
                    return false;
                }

                info!(
                    media_type = %mtd.media_type,
                    path = %import.path,
                    task = %stage,
                    "starting task"
                );
                let mut task: Box<dyn ImportTask> = match stage {
                    TaskType::Removal => Box::new(RemovalTask::new(
                        import.clone(),
                        mtd.handler.create(),
                        self.ctx.clone(),
                    )),
                    _ => Box::new(CleanupTask::new(
                        import.clone(),
                        mtd.handler.create(),
                        self.ctx.clone(),
                    )),
                };
                if !Self::process_task(self.callback.clone(), task.as_mut()).await {
                    warn!(
                        media_type = %mtd.media_type,
                        path = %import.path,
                        task = %stage,
                        "task failed"
                    );
                    all_ok = false;
                }
                kept.push(mtd);
            }

            kept.reverse();
            if let Some(data) = self.import_task_data.get_mut(&key) {
                data.media_type_data = kept;
            }
        }
        all_ok
    }
}
