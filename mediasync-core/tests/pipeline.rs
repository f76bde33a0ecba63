//! End-to-end pipeline scenarios against the in-memory backends.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use mediasync_core::config::EngineConfig;
use mediasync_core::library::MediaLibrary;
use mediasync_core::repository::ImportRepository;
use mediasync_core::{
    ChangesetItem, ChangesetType, GroupedMediaTypes, ImportEvent, MediaItem, MediaType,
};

use common::{engine, engine_with_config, movie, video_source, wait_for_event, wait_until};

#[tokio::test]
async fn test_fresh_import_of_movie_source() {
    let engine = engine().await;
    let mut events = engine.manager.subscribe();

    engine.state.set_items(
        MediaType::Movie,
        vec![
            ChangesetItem::new(ChangesetType::None, movie("src://uuid-A/m1", "M1")),
            ChangesetItem::new(ChangesetType::None, movie("src://uuid-A/m2", "M2")),
        ],
    );

    engine
        .manager
        .add_source(video_source("uuid-A"), true, false)
        .unwrap();
    wait_for_event(&mut events, "source_activated").await;

    let media_types = GroupedMediaTypes::new(vec![MediaType::Movie]);
    engine
        .manager
        .add_recursive_import("uuid-A", "src://uuid-A/", media_types.clone())
        .await
        .unwrap();
    wait_for_event(&mut events, "import_added").await;

    engine.manager.import_source("uuid-A").await.unwrap();
    let updated = wait_for_event(&mut events, "import_updated").await;
    let ImportEvent::ImportUpdated(import) = &updated else {
        panic!("unexpected event");
    };
    assert!(import.last_synced.is_some());

    let movies = engine
        .library
        .items(MediaType::Movie, "uuid-A", Some("src://uuid-A/"))
        .await
        .unwrap();
    assert_eq!(movies.len(), 2);
    let mut titles: Vec<&str> = movies.iter().map(|m| m.title.as_str()).collect();
    titles.sort_unstable();
    assert_eq!(titles, vec!["M1", "M2"]);
    assert!(movies.iter().all(|m| m.enabled));
    assert!(movies.iter().all(|m| m.library_id.is_some()));

    // the sync timestamp reached both the import and the source
    let source = engine.manager.source("uuid-A").await.unwrap();
    assert!(source.last_synced.is_some());
    let stored = engine
        .manager
        .import("src://uuid-A/", &media_types)
        .await
        .unwrap();
    assert!(stored.last_synced.is_some());

    // exactly one import_updated for the cycle
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut extra_updates = 0;
    while let Ok(event) = events.try_recv() {
        if event.name() == "import_updated" {
            extra_updates += 1;
        }
    }
    assert_eq!(extra_updates, 0);
}

#[tokio::test]
async fn test_partial_update_renames_title() {
    let engine = engine().await;
    let mut events = engine.manager.subscribe();

    engine.state.set_items(
        MediaType::Movie,
        vec![ChangesetItem::new(
            ChangesetType::None,
            movie("src://uuid-A/m1", "M1"),
        )],
    );

    engine
        .manager
        .add_source(video_source("uuid-A"), true, false)
        .unwrap();
    wait_for_event(&mut events, "source_activated").await;
    let media_types = GroupedMediaTypes::new(vec![MediaType::Movie]);
    engine
        .manager
        .add_recursive_import("uuid-A", "src://uuid-A/", media_types.clone())
        .await
        .unwrap();
    engine.manager.import_source("uuid-A").await.unwrap();
    wait_for_event(&mut events, "import_updated").await;

    let before = engine
        .library
        .items(MediaType::Movie, "uuid-A", None)
        .await
        .unwrap();
    assert_eq!(before.len(), 1);
    let original_id = before[0].library_id;

    // the adapter now reports a single change instead of the full set
    engine.state.partial.store(true, Ordering::SeqCst);
    engine.state.set_items(
        MediaType::Movie,
        vec![ChangesetItem::new(
            ChangesetType::Changed,
            movie("src://uuid-A/m1", "M1 Director's Cut"),
        )],
    );

    engine.manager.import_source("uuid-A").await.unwrap();
    wait_for_event(&mut events, "import_updated").await;

    let after = engine
        .library
        .items(MediaType::Movie, "uuid-A", None)
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].title, "M1 Director's Cut");
    assert_eq!(after[0].library_id, original_id);
}

#[tokio::test]
async fn test_season_with_missing_show_synthesises_stub() {
    let engine = engine().await;
    let mut events = engine.manager.subscribe();

    let mut season = MediaItem::new(MediaType::Season, "src://uuid-A/showx/s01/", "Season 1");
    {
        let info = season.video_mut();
        info.show_title = Some("Show X".to_string());
        info.year = Some(2020);
        info.season = Some(1);
    }
    let mut episode = MediaItem::new(MediaType::Episode, "src://uuid-A/showx/s01/e01", "Pilot");
    {
        let info = episode.video_mut();
        info.show_title = Some("Show X".to_string());
        info.season = Some(1);
        info.episode = Some(1);
    }
    engine.state.set_items(
        MediaType::Season,
        vec![ChangesetItem::new(ChangesetType::None, season)],
    );
    engine.state.set_items(
        MediaType::Episode,
        vec![ChangesetItem::new(ChangesetType::None, episode)],
    );

    engine
        .manager
        .add_source(video_source("uuid-A"), true, false)
        .unwrap();
    wait_for_event(&mut events, "source_activated").await;

    let media_types =
        GroupedMediaTypes::new(vec![MediaType::TvShow, MediaType::Season, MediaType::Episode]);
    engine
        .manager
        .add_recursive_import("uuid-A", "src://uuid-A/", media_types)
        .await
        .unwrap();
    engine.manager.import_source("uuid-A").await.unwrap();
    wait_for_event(&mut events, "import_updated").await;

    let shows = engine.library.all_items(MediaType::TvShow).await.unwrap();
    assert_eq!(shows.len(), 1, "a stub show was synthesised");
    assert_eq!(shows[0].title, "Show X");
    assert_eq!(shows[0].video.as_ref().and_then(|v| v.year), Some(2020));
    let show_id = shows[0].library_id;
    assert!(show_id.is_some());

    let seasons = engine.library.all_items(MediaType::Season).await.unwrap();
    assert_eq!(seasons.len(), 1);
    assert_eq!(seasons[0].video.as_ref().and_then(|v| v.show_id), show_id);

    let episodes = engine.library.all_items(MediaType::Episode).await.unwrap();
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].video.as_ref().and_then(|v| v.show_id), show_id);
}

#[tokio::test]
async fn test_remove_source_cascades() {
    let engine = engine().await;
    let mut events = engine.manager.subscribe();

    engine
        .manager
        .add_source(video_source("uuid-A"), true, false)
        .unwrap();
    wait_for_event(&mut events, "source_activated").await;

    let movies = GroupedMediaTypes::new(vec![MediaType::Movie]);
    engine
        .manager
        .add_recursive_import("uuid-A", "src://uuid-A/a/", movies.clone())
        .await
        .unwrap();
    engine
        .manager
        .add_recursive_import("uuid-A", "src://uuid-A/b/", movies)
        .await
        .unwrap();

    // library content attributed to both imports
    for (path, import_path) in [
        ("src://uuid-A/a/m1", "src://uuid-A/a/"),
        ("src://uuid-A/b/m2", "src://uuid-A/b/"),
    ] {
        let mut item = movie(path, path);
        item.set_attribution("uuid-A", import_path);
        engine.library.insert(&mut item).await.unwrap();
    }

    engine.manager.remove_source("uuid-A").await.unwrap();

    // the removing flag blocks new work right away
    assert!(engine.manager.import_source("uuid-A").await.is_err());

    // import_removed per import (in order), then source_removed, once each
    let first = wait_for_event(&mut events, "import_removed").await;
    let ImportEvent::ImportRemoved(first_import) = &first else {
        panic!("unexpected event");
    };
    assert_eq!(first_import.path, "src://uuid-A/a/");
    let second = wait_for_event(&mut events, "import_removed").await;
    let ImportEvent::ImportRemoved(second_import) = &second else {
        panic!("unexpected event");
    };
    assert_eq!(second_import.path, "src://uuid-A/b/");
    wait_for_event(&mut events, "source_removed").await;

    assert!(engine.manager.source("uuid-A").await.is_none());
    assert!(engine.manager.imports().await.is_empty());
    assert!(engine
        .repository
        .imports()
        .await
        .unwrap()
        .is_empty());
    assert!(engine
        .library
        .all_items(MediaType::Movie)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_manual_lookup_heartbeat() {
    let mut config = EngineConfig::default();
    config.heartbeat.interval_seconds = 1;
    let engine = engine_with_config(config).await;
    let mut events = engine.manager.subscribe();

    engine.state.set_items(
        MediaType::Movie,
        vec![ChangesetItem::new(
            ChangesetType::None,
            movie("src://uuid-A/m1", "M1"),
        )],
    );

    engine
        .manager
        .add_source(video_source("uuid-A"), true, true)
        .unwrap();
    wait_for_event(&mut events, "source_activated").await;
    engine
        .manager
        .add_recursive_import(
            "uuid-A",
            "src://uuid-A/",
            GroupedMediaTypes::new(vec![MediaType::Movie]),
        )
        .await
        .unwrap();
    engine.manager.import_source("uuid-A").await.unwrap();
    wait_for_event(&mut events, "import_updated").await;

    // the source vanishes from the network
    engine.state.reachable.store(false, Ordering::SeqCst);
    wait_for_event(&mut events, "source_deactivated").await;

    let items = engine
        .library
        .items(MediaType::Movie, "uuid-A", None)
        .await
        .unwrap();
    assert!(items.iter().all(|item| !item.enabled));
    assert!(!engine.manager.is_source_active("uuid-A"));

    // ... and comes back
    engine.state.reachable.store(true, Ordering::SeqCst);
    wait_for_event(&mut events, "source_activated").await;
    assert!(engine.manager.is_source_active("uuid-A"));

    let library = engine.library.clone();
    wait_until(move || {
        let library = library.clone();
        futures::executor::block_on(async move {
            library
                .items(MediaType::Movie, "uuid-A", None)
                .await
                .map(|items| items.iter().all(|item| item.enabled))
                .unwrap_or(false)
        })
    })
    .await;

    // the auto trigger schedules a fresh synchronisation
    wait_for_event(&mut events, "import_updated").await;
}

#[tokio::test]
async fn test_update_on_source_gated_by_setting() {
    let engine = engine().await;
    let mut events = engine.manager.subscribe();

    engine
        .manager
        .add_source(video_source("uuid-A"), true, false)
        .unwrap();
    wait_for_event(&mut events, "source_activated").await;

    let media_types = GroupedMediaTypes::new(vec![MediaType::Movie]);
    engine
        .manager
        .add_recursive_import("uuid-A", "src://uuid-A/", media_types.clone())
        .await
        .unwrap();

    let mut played = movie("src://uuid-A/m1", "M1");
    played.set_attribution("uuid-A", "src://uuid-A/");
    played.playback.play_count = 1;

    engine
        .manager
        .update_imported_item_on_source(played.clone())
        .await
        .unwrap();

    let state = engine.state.clone();
    wait_until(move || state.updates_on_source.lock().len() == 1).await;
    assert_eq!(
        engine.state.updates_on_source.lock()[0].path,
        "src://uuid-A/m1"
    );

    // disabling the setting suppresses further pushes
    let mut import = engine
        .manager
        .import("src://uuid-A/", &media_types)
        .await
        .unwrap();
    import.settings.set_update_playback_metadata_on_source(false);
    engine.manager.update_import(&import).await.unwrap();

    engine
        .manager
        .update_imported_item_on_source(played)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.state.updates_on_source.lock().len(), 1);
}
