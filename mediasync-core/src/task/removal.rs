//! Bulk removal of an import's items, used when an import or its source is
//! removed.

use async_trait::async_trait;

use crate::handler::MediaTypeHandler;
use crate::models::Import;
use crate::{Error, Result};

use super::{ImportTask, TaskContext, TaskType};

pub struct RemovalTask {
    import: Import,
    handler: Box<dyn MediaTypeHandler>,
    ctx: TaskContext,
}

impl RemovalTask {
    #[must_use]
    pub fn new(import: Import, handler: Box<dyn MediaTypeHandler>, ctx: TaskContext) -> Self {
        Self {
            import,
            handler,
            ctx,
        }
    }
}

#[async_trait]
impl ImportTask for RemovalTask {
    fn task_type(&self) -> TaskType {
        TaskType::Removal
    }

    fn import(&self) -> &Import {
        &self.import
    }

    async fn run(&mut self) -> Result<()> {
        if self.ctx.should_cancel(0, 0) {
            return Err(Error::Cancelled);
        }
        self.handler.remove_imported_items(&self.import).await
    }
}
