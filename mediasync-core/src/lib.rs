//! MediaSync core: a media import engine.
//!
//! The engine continuously pulls catalog metadata (movies, shows, seasons,
//! episodes, music videos, artists, albums, songs) from external sources
//! and reconciles it against a local library — matching retrieved items to
//! stored ones, computing Add/Change/Remove deltas and applying them in
//! dependency order, with per-source job serialization and cooperative
//! cancellation.
//!
//! The crate is backend-agnostic: persistence of sources/imports goes
//! through [`repository::ImportRepository`], the library itself through
//! [`library::MediaLibrary`], and source access through the
//! [`importer`] adapter traits. In-memory implementations of the first two
//! ship with the crate.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediasync_core::{config::EngineConfig, ImportManager};
//! use mediasync_core::handler::MovieImportHandler;
//! use mediasync_core::library::InMemoryMediaLibrary;
//! use mediasync_core::repository::InMemoryImportRepository;
//!
//! # async fn setup() -> mediasync_core::Result<()> {
//! let library = Arc::new(InMemoryMediaLibrary::new());
//! let manager = ImportManager::new(EngineConfig::default());
//! manager.register_type_handler(Arc::new(MovieImportHandler::new(library)));
//! // register importer factories and repositories here
//! manager.register_repository(Arc::new(InMemoryImportRepository::new()));
//! manager.initialize().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod importer;
pub mod jobs;
pub mod library;
pub mod logging;
pub mod manager;
pub mod media_type;
pub mod models;
pub mod paths;
pub mod repository;
pub mod settings;
pub mod task;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use manager::{ImportEvent, ImportManager};
pub use media_type::{GroupedMediaTypes, MediaType, MediaTypeSet};
pub use models::{ChangesetItem, ChangesetItems, ChangesetType, Import, MediaItem, Source};
