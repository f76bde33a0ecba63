//! Pushing one item's playback metadata back to its source.

use std::sync::Arc;

use async_trait::async_trait;

use crate::importer::Importer;
use crate::models::{Import, MediaItem};
use crate::{Error, Result};

use super::{ImportTask, TaskContext, TaskType};

/// The task handed to [`Importer::update_on_source`].
pub struct UpdateTask {
    import: Import,
    item: MediaItem,
    importer: Arc<dyn Importer>,
    ctx: TaskContext,
}

impl UpdateTask {
    #[must_use]
    pub fn new(
        import: Import,
        item: MediaItem,
        importer: Arc<dyn Importer>,
        ctx: TaskContext,
    ) -> Self {
        Self {
            import,
            item,
            importer,
            ctx,
        }
    }

    /// The item whose playback metadata should be written back.
    #[must_use]
    pub fn item(&self) -> &MediaItem {
        &self.item
    }
}

#[async_trait]
impl ImportTask for UpdateTask {
    fn task_type(&self) -> TaskType {
        TaskType::Update
    }

    fn import(&self) -> &Import {
        &self.import
    }

    async fn run(&mut self) -> Result<()> {
        if self.ctx.should_cancel(0, 0) {
            return Err(Error::Cancelled);
        }
        let importer = self.importer.clone();
        importer.update_on_source(self).await
    }
}
