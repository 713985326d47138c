//! ==============================================================================
//! aggregator.rs - per-series latest/min/max cache
//! ==============================================================================
//!
//! purpose:
//!     keeps a running summary for every series so snapshot reads never
//!     rescan the reading log. the summaries are pure derived state: they
//!     are never persisted and are rebuilt from the log at startup.
//!
//! relationships:
//!     - used by: hub.rs (owns it behind a RwLock), ingest.rs (observe),
//!       query.rs (snapshot reads)
//!     - reads: store.rs (replay via scan_all)
//!
//! ==============================================================================

use crate::domain::{Reading, SeriesSummary};
use crate::error::HubResult;
use crate::store::ReadingStore;

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default, Clone)]
pub struct SeriesAggregator {
    series: HashMap<String, SeriesSummary>,
}

impl SeriesAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// replay every durable reading into a fresh aggregator
    pub fn rebuild(store: &dyn ReadingStore) -> HubResult<Self> {
        let mut aggregator = Self::new();
        store.scan_all(&mut |reading| {
            aggregator.observe(&reading);
        })?;
        Ok(aggregator)
    }

    /// fold one reading into its series summary
    pub fn observe(&mut self, reading: &Reading) -> SeriesSummary {
        let value = reading.value;

        let summary = self
            .series
            .entry(reading.series_id.clone())
            .and_modify(|s| {
                s.latest = value;
                s.min = s.min.min(value);
                s.max = s.max.max(value);
                s.count += 1;
            })
            .or_insert_with(|| SeriesSummary {
                series_id: reading.series_id.clone(),
                latest: value,
                min: value,
                max: value,
                count: 1,
            });

        summary.clone()
    }

    pub fn snapshot(&self, series_id: &str) -> Option<SeriesSummary> {
        self.series.get(series_id).cloned()
    }

    /// all summaries, ordered by series id
    pub fn snapshot_all(&self) -> BTreeMap<String, SeriesSummary> {
        self.series
            .iter()
            .map(|(id, summary)| (id.clone(), summary.clone()))
            .collect()
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}
