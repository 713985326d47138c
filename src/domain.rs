use serde::{Deserialize, Serialize};

/// series id used when a submission does not name one
pub const DEFAULT_SERIES_ID: &str = "default";

/// row id assigned by the reading store
pub type ReadingId = i64;

/// a single timestamped numeric observation
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Reading {
    pub id: ReadingId,

    /// logical source of the reading (e.g., "esp32-livingroom")
    pub series_id: String,

    pub value: f64,

    /// reading timestamp in milliseconds since the unix epoch
    pub timestamp_ms: u64,
}

/// running summary for one series
///
/// only exists once the series has at least one reading,
/// so `min <= max` always holds.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SeriesSummary {
    #[serde(skip)]
    pub series_id: String,
    pub latest: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// one entry of a series history
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct HistoryPoint {
    pub value: f64,
    pub timestamp_ms: u64,
}

impl From<&Reading> for HistoryPoint {
    fn from(r: &Reading) -> Self {
        Self { value: r.value, timestamp_ms: r.timestamp_ms }
    }
}

/// current wall clock time in milliseconds
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
