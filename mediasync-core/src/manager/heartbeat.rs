//! Periodic reachability check for manually added sources.
//!
//! Discovered sources announce themselves; manually added ones have to be
//! probed. Every tick asks the importer of each manually added source to
//! look it up, deactivating sources that became unreachable and
//! re-activating ones that came back.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::Inner;

pub(super) fn spawn(inner: &Arc<Inner>) -> JoinHandle<()> {
    let interval = Duration::from_secs(inner.config.heartbeat.interval_seconds.max(1));
    let weak: Weak<Inner> = Arc::downgrade(inner);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately; sources were just activated
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tick(&inner).await;
        }
    })
}

async fn tick(inner: &Arc<Inner>) {
    let sources = inner.merged_sources_all().await;
    for source in sources {
        if !source.manually_added {
            continue;
        }
        let Some(runtime) = inner.runtime_flags(&source.identifier) else {
            continue;
        };
        if runtime.removing {
            continue;
        }
        let Some(importer) = inner.create_importer_by_id(&runtime.importer_id) else {
            continue;
        };

        let reachable = importer.lookup_source(&source).await;
        debug!(
            source = %source.identifier,
            reachable,
            active = runtime.active,
            "manual source lookup"
        );

        if runtime.active && !reachable {
            Inner::deactivate_source(inner, &source.identifier).await;
        } else if !runtime.active && reachable {
            Inner::queue_source_activation(inner, source.identifier.clone());
        }
    }
}
