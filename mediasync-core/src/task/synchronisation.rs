//! Application of a computed changeset to the library.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::handler::MediaTypeHandler;
use crate::models::{ChangesetItems, ChangesetType, Import};
use crate::{Error, Result};

use super::{ImportTask, TaskContext, TaskType};

/// Applies one media type's Added/Changed/Removed items inside a handler
/// transaction. A persistence failure rolls the transaction back and fails
/// the task; the processor then continues with the other media types.
pub struct SynchronisationTask {
    import: Import,
    handler: Box<dyn MediaTypeHandler>,
    items: ChangesetItems,
    ctx: TaskContext,
}

impl SynchronisationTask {
    #[must_use]
    pub fn new(
        import: Import,
        handler: Box<dyn MediaTypeHandler>,
        items: ChangesetItems,
        ctx: TaskContext,
    ) -> Self {
        Self {
            import,
            handler,
            items,
            ctx,
        }
    }

    async fn apply_items(&mut self) -> Result<()> {
        let total = self.items.len() as u64;
        let mut items = std::mem::take(&mut self.items);

        for (progress, entry) in items.iter_mut().enumerate() {
            if self.ctx.should_cancel(progress as u64, total) {
                return Err(Error::Cancelled);
            }

            let label = self.handler.item_label(&entry.item);
            self.ctx.progress().set_text(label);

            match entry.changeset {
                ChangesetType::Added => {
                    self.handler
                        .add_imported_item(&self.import, &mut entry.item)
                        .await?;
                }
                ChangesetType::Changed => {
                    self.handler
                        .update_imported_item(&self.import, &entry.item)
                        .await?;
                }
                ChangesetType::Removed => {
                    self.handler
                        .remove_imported_item(&self.import, &entry.item)
                        .await?;
                }
                ChangesetType::None => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ImportTask for SynchronisationTask {
    fn task_type(&self) -> TaskType {
        TaskType::Synchronisation
    }

    fn import(&self) -> &Import {
        &self.import
    }

    async fn run(&mut self) -> Result<()> {
        if self.items.is_empty() {
            return Ok(());
        }

        if self.ctx.should_cancel(0, self.items.len() as u64) {
            return Err(Error::Cancelled);
        }

        self.handler.start_synchronisation(&self.import).await?;
        info!(
            media_type = %self.handler.media_type(),
            count = self.items.len(),
            source = %self.import.source.friendly_name,
            "handling imported items"
        );

        if let Err(err) = self.apply_items().await {
            warn!(
                media_type = %self.handler.media_type(),
                %err,
                "synchronisation failed, rolling back"
            );
            if let Err(rollback_err) = self.handler.abort_synchronisation(&self.import).await {
                warn!(%rollback_err, "rollback failed");
            }
            return Err(err);
        }

        self.handler.finish_synchronisation(&self.import).await?;

        // freshly synchronised items are always visible
        self.handler
            .set_imported_items_enabled(&self.import, true)
            .await?;

        Ok(())
    }
}
