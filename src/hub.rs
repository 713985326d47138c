//! ==============================================================================
//! hub.rs - shared hub state handed to request handlers
//! ==============================================================================
//!
//! purpose:
//!     owns the reading log and the aggregator cache. the http layer gets a
//!     clone-able handle through axum State, there is no global state.
//!
//! locking:
//!
//! ```text
//!     submit ──► write_lock (mutex) ──► store.append ──► aggregator.write()
//!     snapshot ─────────────────────────────────────────► aggregator.read()
//!     history / matrix ───────────► store.scan (single sql query)
//! ```
//!
//! ```text
//!     - one global write lock serializes appends, so the log order and the
//!       aggregator fold order are the same.
//!     - the aggregator RwLock lets snapshot reads run concurrently and never
//!       observe a half-updated summary.
//! ```
//!
//! relationships:
//!     - used by: api.rs, main.rs
//!     - extended by: ingest.rs (submit), query.rs (reads)
//!
//! ==============================================================================

use crate::aggregator::SeriesAggregator;
use crate::error::HubResult;
use crate::store::ReadingStore;

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Clone)]
pub struct Hub {
    pub(crate) inner: Arc<HubInner>,
}

pub(crate) struct HubInner {
    pub(crate) store: Arc<dyn ReadingStore>,
    pub(crate) aggregator: RwLock<SeriesAggregator>,
    pub(crate) write_lock: Mutex<()>,
}

impl Hub {
    /// build a hub over `store`, replaying the log into the aggregator first.
    ///
    /// nothing is served before the replay finishes, so the cache never
    /// misses a reading that is already durable.
    pub async fn open(store: Arc<dyn ReadingStore>) -> HubResult<Self> {
        let replay_store = store.clone();
        let aggregator =
            tokio::task::spawn_blocking(move || SeriesAggregator::rebuild(replay_store.as_ref()))
                .await??;

        tracing::info!(series = aggregator.series_count(), "aggregator rebuilt from reading log");

        Ok(Self {
            inner: Arc::new(HubInner {
                store,
                aggregator: RwLock::new(aggregator),
                write_lock: Mutex::new(()),
            }),
        })
    }

    pub async fn series_count(&self) -> usize {
        self.inner.aggregator.read().await.series_count()
    }
}
