//! Matching of retrieved items against the local library.

use async_trait::async_trait;
use tracing::warn;

use crate::handler::MediaTypeHandler;
use crate::models::{ChangesetItem, ChangesetItems, ChangesetType, Import, MediaItem};
use crate::{Error, Result};

use super::{ImportTask, TaskContext, TaskType};

/// Classifies one media type's retrieved items as Added/Changed/Removed.
///
/// With a full batch (`partial_changeset == false`) every local item that no
/// retrieved item matches is appended as `Removed` at the end. With a
/// partial batch the adapter's own classification is resolved against the
/// local items per the rules in [`run`](ImportTask::run). Items that end up
/// as `None` are discarded.
pub struct ChangesetTask {
    import: Import,
    handler: Box<dyn MediaTypeHandler>,
    local_items: Vec<MediaItem>,
    retrieved_items: ChangesetItems,
    partial_changeset: bool,
    changeset: ChangesetItems,
    ctx: TaskContext,
}

impl ChangesetTask {
    #[must_use]
    pub fn new(
        import: Import,
        handler: Box<dyn MediaTypeHandler>,
        local_items: Vec<MediaItem>,
        retrieved_items: ChangesetItems,
        partial_changeset: bool,
        ctx: TaskContext,
    ) -> Self {
        Self {
            import,
            handler,
            local_items,
            retrieved_items,
            partial_changeset,
            changeset: ChangesetItems::new(),
            ctx,
        }
    }

    /// The computed changeset; empty before [`run`](ImportTask::run).
    pub fn take_changeset(&mut self) -> ChangesetItems {
        std::mem::take(&mut self.changeset)
    }

    fn classify(&mut self, mut entry: ChangesetItem) -> Option<ChangesetItem> {
        let matching = self.handler.find_matching_local_item(
            &self.import,
            &entry.item,
            &self.local_items,
        );

        match matching {
            None => {
                if self.partial_changeset {
                    match entry.changeset {
                        ChangesetType::None | ChangesetType::Added => {
                            entry.changeset = ChangesetType::Added;
                        }
                        ChangesetType::Changed => {
                            warn!(
                                path = %entry.item.path,
                                import = %self.import.path,
                                "unable to change item without a matching local item"
                            );
                            entry.changeset = ChangesetType::None;
                        }
                        ChangesetType::Removed => {
                            entry.changeset = ChangesetType::None;
                        }
                    }
                } else {
                    entry.changeset = ChangesetType::Added;
                }
            }
            Some(index) => {
                // consume the match so the local item doesn't read as
                // removed later on
                let local = self.local_items.remove(index);

                if self.partial_changeset {
                    match entry.changeset {
                        // an already imported item cannot be added again
                        ChangesetType::None | ChangesetType::Added => {
                            entry.changeset = ChangesetType::Changed;
                        }
                        // replace with the local item so the handler can
                        // delete by local identity
                        ChangesetType::Removed => {
                            entry.item = local.clone();
                        }
                        ChangesetType::Changed => {}
                    }
                }

                if entry.changeset != ChangesetType::Removed {
                    if !self.import.settings.update_imported_items() {
                        entry.changeset = ChangesetType::None;
                    } else {
                        entry.changeset = self.handler.determine_changeset(
                            &self.import,
                            &entry.item,
                            &local,
                        );
                        if entry.changeset != ChangesetType::None {
                            self.handler
                                .prepare_imported_item(&self.import, &mut entry.item, &local);
                        }
                    }
                }
            }
        }

        (entry.changeset != ChangesetType::None).then_some(entry)
    }
}

#[async_trait]
impl ImportTask for ChangesetTask {
    fn task_type(&self) -> TaskType {
        TaskType::Changeset
    }

    fn import(&self) -> &Import {
        &self.import
    }

    async fn run(&mut self) -> Result<()> {
        let total = self.retrieved_items.len() as u64;
        if self.ctx.should_cancel(0, total) {
            return Err(Error::Cancelled);
        }

        self.handler.start_changeset(&self.import).await?;

        let retrieved = std::mem::take(&mut self.retrieved_items);
        for (progress, entry) in retrieved.into_iter().enumerate() {
            if self.ctx.should_cancel(progress as u64, total) {
                return Err(Error::Cancelled);
            }
            if let Some(classified) = self.classify(entry) {
                self.changeset.push(classified);
            }
        }

        if !self.partial_changeset {
            // whatever is left locally was not seen on the source
            for local in self.local_items.drain(..) {
                self.changeset
                    .push(ChangesetItem::new(ChangesetType::Removed, local));
            }
        }
        self.local_items.clear();

        self.handler.finish_changeset(&self.import).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MovieImportHandler;
    use crate::library::{InMemoryMediaLibrary, MediaLibrary};
    use crate::media_type::{GroupedMediaTypes, MediaType};
    use crate::models::Source;
    use std::sync::Arc;

    fn import() -> Import {
        Import::recursive(
            "src://uuid-A/",
            GroupedMediaTypes::new(vec![MediaType::Movie]),
            Source::new("uuid-A", "src://uuid-A/"),
        )
    }

    fn handler() -> Box<dyn MediaTypeHandler> {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        Box::new(MovieImportHandler::new(library))
    }

    fn movie(path: &str, title: &str) -> MediaItem {
        let mut item = MediaItem::new(MediaType::Movie, path, title);
        item.library_id = Some(1);
        item
    }

    fn run_task(
        local: Vec<MediaItem>,
        retrieved: ChangesetItems,
        partial: bool,
    ) -> ChangesetItems {
        let mut task = ChangesetTask::new(
            import(),
            handler(),
            local,
            retrieved,
            partial,
            TaskContext::default(),
        );
        futures::executor::block_on(task.run()).unwrap();
        task.take_changeset()
    }

    #[test]
    fn test_full_changeset_completeness() {
        let local = vec![
            movie("src://uuid-A/m1", "M1"),
            movie("src://uuid-A/m2", "M2"),
        ];
        let retrieved = vec![
            // unchanged: matched, equal -> dropped
            ChangesetItem::new(ChangesetType::None, {
                let mut m = movie("src://uuid-A/m1", "M1");
                m.library_id = None;
                m
            }),
            // new on the source -> Added
            ChangesetItem::new(
                ChangesetType::None,
                MediaItem::new(MediaType::Movie, "src://uuid-A/m3", "M3"),
            ),
        ];

        let changeset = run_task(local, retrieved, false);
        assert_eq!(changeset.len(), 2);
        assert_eq!(changeset[0].changeset, ChangesetType::Added);
        assert_eq!(changeset[0].item.path, "src://uuid-A/m3");
        // local m2 was never seen -> Removed, appended at the end
        assert_eq!(changeset[1].changeset, ChangesetType::Removed);
        assert_eq!(changeset[1].item.path, "src://uuid-A/m2");
    }

    #[test]
    fn test_full_changeset_detects_change_and_prepares() {
        let local = vec![movie("src://uuid-A/m1", "M1")];
        let retrieved = vec![ChangesetItem::new(
            ChangesetType::None,
            MediaItem::new(MediaType::Movie, "src://uuid-A/m1", "M1 Director's Cut"),
        )];

        let changeset = run_task(local, retrieved, false);
        assert_eq!(changeset.len(), 1);
        assert_eq!(changeset[0].changeset, ChangesetType::Changed);
        // prepared: identity copied from the local item
        assert_eq!(changeset[0].item.library_id, Some(1));
    }

    #[test]
    fn test_partial_rules() {
        let local = vec![movie("src://uuid-A/m1", "M1")];
        let retrieved = vec![
            // Added with a match -> Changed
            ChangesetItem::new(
                ChangesetType::Added,
                MediaItem::new(MediaType::Movie, "src://uuid-A/m1", "M1 new"),
            ),
            // Changed without a match -> dropped with a warning
            ChangesetItem::new(
                ChangesetType::Changed,
                MediaItem::new(MediaType::Movie, "src://uuid-A/mX", "ghost"),
            ),
            // Removed without a match -> dropped
            ChangesetItem::new(
                ChangesetType::Removed,
                MediaItem::new(MediaType::Movie, "src://uuid-A/mY", "ghost"),
            ),
            // Added without a match -> Added
            ChangesetItem::new(
                ChangesetType::Added,
                MediaItem::new(MediaType::Movie, "src://uuid-A/m2", "M2"),
            ),
        ];

        let changeset = run_task(local, retrieved, true);
        assert_eq!(changeset.len(), 2);
        assert_eq!(changeset[0].changeset, ChangesetType::Changed);
        assert_eq!(changeset[1].changeset, ChangesetType::Added);
        assert_eq!(changeset[1].item.path, "src://uuid-A/m2");
    }

    #[test]
    fn test_partial_removed_with_match_uses_local_identity() {
        let local = vec![movie("src://uuid-A/m1", "M1")];
        let retrieved = vec![ChangesetItem::new(
            ChangesetType::Removed,
            MediaItem::new(MediaType::Movie, "src://uuid-A/m1", "whatever"),
        )];

        let changeset = run_task(local, retrieved, true);
        assert_eq!(changeset.len(), 1);
        assert_eq!(changeset[0].changeset, ChangesetType::Removed);
        // the emitted item is the local one, with its library id
        assert_eq!(changeset[0].item.library_id, Some(1));
        assert_eq!(changeset[0].item.title, "M1");
        // no synthetic removals in partial mode
    }

    #[test]
    fn test_update_disabled_emits_nothing_for_matches() {
        let mut import_no_updates = import();
        import_no_updates.settings.set_update_imported_items(false);

        let mut task = ChangesetTask::new(
            import_no_updates,
            handler(),
            vec![movie("src://uuid-A/m1", "M1")],
            vec![ChangesetItem::new(
                ChangesetType::None,
                MediaItem::new(MediaType::Movie, "src://uuid-A/m1", "renamed"),
            )],
            false,
            TaskContext::default(),
        );
        futures::executor::block_on(task.run()).unwrap();
        let changeset = task.take_changeset();
        assert!(changeset.is_empty());
    }

    #[test]
    fn test_cancellation() {
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let mut task = ChangesetTask::new(
            import(),
            handler(),
            Vec::new(),
            Vec::new(),
            false,
            TaskContext::new(token),
        );
        let result = futures::executor::block_on(task.run());
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
