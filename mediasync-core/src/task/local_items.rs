//! Retrieval of the items currently attributed to an import.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::handler::MediaTypeHandler;
use crate::media_type::MediaType;
use crate::models::{Import, MediaItem};
use crate::{Error, Result};

use super::{ImportTask, TaskContext, TaskType};

pub struct LocalItemsRetrievalTask {
    import: Import,
    handlers: Vec<(MediaType, Box<dyn MediaTypeHandler>)>,
    local_items: HashMap<MediaType, Vec<MediaItem>>,
    ctx: TaskContext,
}

impl LocalItemsRetrievalTask {
    #[must_use]
    pub fn new(
        import: Import,
        handlers: Vec<(MediaType, Box<dyn MediaTypeHandler>)>,
        ctx: TaskContext,
    ) -> Self {
        Self {
            import,
            handlers,
            local_items: HashMap::new(),
            ctx,
        }
    }

    /// Hands out the retrieved items of one media type.
    pub fn take_local_items(&mut self, media_type: MediaType) -> Vec<MediaItem> {
        self.local_items.remove(&media_type).unwrap_or_default()
    }
}

#[async_trait]
impl ImportTask for LocalItemsRetrievalTask {
    fn task_type(&self) -> TaskType {
        TaskType::LocalItemsRetrieval
    }

    fn import(&self) -> &Import {
        &self.import
    }

    async fn run(&mut self) -> Result<()> {
        let total = self.handlers.len() as u64;
        for (index, (media_type, handler)) in self.handlers.iter().enumerate() {
            if self.ctx.should_cancel(index as u64, total) {
                return Err(Error::Cancelled);
            }

            let items = handler.local_items(&self.import).await?;
            debug!(
                media_type = %media_type,
                count = items.len(),
                path = %self.import.path,
                "retrieved local items"
            );
            self.local_items.insert(*media_type, items);
        }
        Ok(())
    }
}
