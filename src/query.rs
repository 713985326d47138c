//! ==============================================================================
//! query.rs - read side: snapshot, history, aligned matrix
//! ==============================================================================
//!
//! purpose:
//!     answers reads for visualization clients. snapshots come from the
//!     aggregator cache, history and the matrix come from the reading log.
//!
//! aligned matrix:
//!     series rarely share a sampling cadence, so charting needs one common
//!     time axis. the axis is the sorted set of distinct timestamps across
//!     all included readings, and every series gets a row of that length:
//!
//! ```text
//!         timestamps:  [ 100,  150,  200,  300 ]
//!         "a":         [ 20.1, null, 20.4, null]
//!         "b":         [ null, 5.0,  5.2,  5.1 ]
//! ```
//!
//! ```text
//!     readings that share a timestamp share an index. within one series a
//!     later reading overwrites an earlier one at the same index.
//! ```
//!
//! ==============================================================================

use crate::domain::{HistoryPoint, Reading, SeriesSummary};
use crate::error::HubResult;
use crate::hub::Hub;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AlignedMatrix {
    pub timestamps: Vec<u64>,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

impl AlignedMatrix {
    /// build the matrix from readings in insertion order
    pub fn from_readings(readings: &[Reading]) -> Self {
        let timestamps: Vec<u64> = readings
            .iter()
            .map(|r| r.timestamp_ms)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut series: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for r in readings {
            let row = series
                .entry(r.series_id.clone())
                .or_insert_with(|| vec![None; timestamps.len()]);

            if let Ok(idx) = timestamps.binary_search(&r.timestamp_ms) {
                row[idx] = Some(r.value);
            }
        }

        Self { timestamps, series }
    }
}

impl Hub {
    /// latest/min/max/count for every known series
    pub async fn get_snapshot(&self) -> BTreeMap<String, SeriesSummary> {
        self.inner.aggregator.read().await.snapshot_all()
    }

    /// history for one series ordered by timestamp, empty when the series
    /// is unknown. readings with equal timestamps keep insertion order.
    pub async fn get_history(&self, series_id: &str) -> HubResult<Vec<HistoryPoint>> {
        let store = self.inner.store.clone();
        let series_id = series_id.to_string();

        let mut points = tokio::task::spawn_blocking(move || {
            let mut points = Vec::new();
            store.scan(Some(series_id.as_str()), &mut |r| points.push(HistoryPoint::from(&r)))?;
            HubResult::Ok(points)
        })
        .await??;

        // client timestamps may arrive out of order; sort is stable
        points.sort_by_key(|p| p.timestamp_ms);
        Ok(points)
    }

    pub async fn get_aligned_matrix(&self) -> HubResult<AlignedMatrix> {
        self.get_aligned_matrix_for(None).await
    }

    /// aligned matrix restricted to `series_ids`, the axis only covers
    /// timestamps of the included series
    pub async fn get_aligned_matrix_for(
        &self,
        series_ids: Option<Vec<String>>,
    ) -> HubResult<AlignedMatrix> {
        let store = self.inner.store.clone();
        let filter: Option<HashSet<String>> = series_ids.map(|ids| ids.into_iter().collect());

        let readings = tokio::task::spawn_blocking(move || {
            let mut readings = Vec::new();
            store.scan_all(&mut |r| {
                if filter.as_ref().map_or(true, |f| f.contains(&r.series_id)) {
                    readings.push(r);
                }
            })?;
            HubResult::Ok(readings)
        })
        .await??;

        Ok(AlignedMatrix::from_readings(&readings))
    }
}
