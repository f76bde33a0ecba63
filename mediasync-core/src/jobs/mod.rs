//! Background job queues.

mod queue;

pub use queue::{LibraryQueue, SourceOpQueue};
