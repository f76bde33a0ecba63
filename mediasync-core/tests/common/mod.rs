//! Shared fixtures: a scriptable importer and a fully wired engine.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast::Receiver;

use mediasync_core::config::EngineConfig;
use mediasync_core::handler::{
    AlbumImportHandler, ArtistImportHandler, EpisodeImportHandler, MovieImportHandler,
    MusicVideoImportHandler, SeasonImportHandler, SongImportHandler, TvShowImportHandler,
};
use mediasync_core::importer::{Importer, ImporterDiscoverer, ImporterFactory, SourceObserver};
use mediasync_core::library::InMemoryMediaLibrary;
use mediasync_core::repository::InMemoryImportRepository;
use mediasync_core::task::{ImportItemsRetrievalTask, UpdateTask};
use mediasync_core::{
    ChangesetItems, ImportEvent, ImportManager, MediaItem, MediaType, Result, Source,
};

/// Scriptable state shared between a test and its importer instances.
pub struct TestState {
    pub reachable: AtomicBool,
    pub ready: AtomicBool,
    pub partial: AtomicBool,
    /// What the next `import()` call deposits, per media type.
    pub items: Mutex<HashMap<MediaType, ChangesetItems>>,
    /// Items pushed back through `update_on_source`.
    pub updates_on_source: Mutex<Vec<MediaItem>>,
}

impl TestState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(true),
            ready: AtomicBool::new(true),
            partial: AtomicBool::new(false),
            items: Mutex::new(HashMap::new()),
            updates_on_source: Mutex::new(Vec::new()),
        })
    }

    pub fn set_items(&self, media_type: MediaType, items: ChangesetItems) {
        self.items.lock().insert(media_type, items);
    }

    pub fn clear_items(&self) {
        self.items.lock().clear();
    }
}

pub struct TestImporterFactory {
    pub state: Arc<TestState>,
}

impl ImporterFactory for TestImporterFactory {
    fn id(&self) -> &str {
        "test"
    }

    fn create_discoverer(&self) -> Box<dyn ImporterDiscoverer> {
        Box::new(NoopDiscoverer)
    }

    fn create_importer(&self) -> Box<dyn Importer> {
        Box::new(TestImporter {
            state: self.state.clone(),
        })
    }

    fn create_observer(&self) -> Option<Box<dyn SourceObserver>> {
        None
    }
}

struct NoopDiscoverer;

#[async_trait]
impl ImporterDiscoverer for NoopDiscoverer {}

pub struct TestImporter {
    state: Arc<TestState>,
}

#[async_trait]
impl Importer for TestImporter {
    fn can_lookup_source(&self) -> bool {
        true
    }

    fn source_lookup_protocol(&self) -> &str {
        "test"
    }

    async fn discover_source(&self, _source: &mut Source) -> bool {
        false
    }

    async fn lookup_source(&self, _source: &Source) -> bool {
        self.state.reachable.load(Ordering::SeqCst)
    }

    fn can_import(&self, path: &str) -> bool {
        path.starts_with("src://")
    }

    async fn is_source_ready(&self, _source: &mut Source) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    async fn is_import_ready(&self, _import: &mut mediasync_core::Import) -> bool {
        true
    }

    fn can_update_metadata_on_source(&self, _path: &str) -> bool {
        true
    }

    fn can_update_playcount_on_source(&self, _path: &str) -> bool {
        false
    }

    fn can_update_last_played_on_source(&self, _path: &str) -> bool {
        true
    }

    fn can_update_resume_position_on_source(&self, _path: &str) -> bool {
        true
    }

    async fn import(&self, task: &mut ImportItemsRetrievalTask) -> Result<()> {
        task.set_changeset(self.state.partial.load(Ordering::SeqCst));

        let media_types: Vec<MediaType> = task.media_types().iter().collect();
        let items = self.state.items.lock().clone();
        for media_type in media_types {
            if let Some(batch) = items.get(&media_type) {
                task.set_items(batch.clone(), media_type);
            }
        }
        Ok(())
    }

    async fn update_on_source(&self, task: &UpdateTask) -> Result<()> {
        self.state.updates_on_source.lock().push(task.item().clone());
        Ok(())
    }
}

/// A fully wired engine over in-memory backends.
pub struct TestEngine {
    pub manager: ImportManager,
    pub library: Arc<InMemoryMediaLibrary>,
    pub repository: Arc<InMemoryImportRepository>,
    pub state: Arc<TestState>,
}

pub async fn engine() -> TestEngine {
    engine_with_config(EngineConfig::default()).await
}

pub async fn engine_with_config(config: EngineConfig) -> TestEngine {
    let library = Arc::new(InMemoryMediaLibrary::new());
    let manager = ImportManager::new(config);

    manager.register_type_handler(Arc::new(MovieImportHandler::new(library.clone())));
    manager.register_type_handler(Arc::new(MusicVideoImportHandler::new(library.clone())));
    manager.register_type_handler(Arc::new(TvShowImportHandler::new(library.clone())));
    manager.register_type_handler(Arc::new(SeasonImportHandler::new(library.clone())));
    manager.register_type_handler(Arc::new(EpisodeImportHandler::new(library.clone())));
    manager.register_type_handler(Arc::new(ArtistImportHandler::new(library.clone())));
    manager.register_type_handler(Arc::new(AlbumImportHandler::new(library.clone())));
    manager.register_type_handler(Arc::new(SongImportHandler::new(library.clone())));

    let state = TestState::new();
    manager.register_importer_factory(Arc::new(TestImporterFactory {
        state: state.clone(),
    }));

    let repository = Arc::new(InMemoryImportRepository::new());
    manager.register_repository(repository.clone());

    manager.initialize().await.expect("engine initializes");

    TestEngine {
        manager,
        library,
        repository,
        state,
    }
}

pub fn video_source(identifier: &str) -> Source {
    let mut source = Source::new(identifier, format!("src://{identifier}/"));
    source.friendly_name = format!("Server {identifier}");
    source.available_media_types = [
        MediaType::Movie,
        MediaType::TvShow,
        MediaType::Season,
        MediaType::Episode,
    ]
    .into_iter()
    .collect();
    source
}

pub fn movie(path: &str, title: &str) -> MediaItem {
    MediaItem::new(MediaType::Movie, path, title)
}

/// Waits (up to 10 s) for the next event with the given name, skipping
/// everything else.
pub async fn wait_for_event(events: &mut Receiver<ImportEvent>, name: &str) -> ImportEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = events.recv().await.expect("event feed open");
            if event.name() == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for '{name}'"))
}

/// Waits until `check` passes, polling every 20 ms for up to 5 s.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..250 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
