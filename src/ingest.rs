//! ==============================================================================
//! ingest.rs - submission validation and write path
//! ==============================================================================
//!
//! purpose:
//!     turns a raw json submission from a sensor node into a durable reading.
//!
//! write path:
//!     1. validate (no state touched on failure)
//!     2. append to the reading log
//!     3. fold into the aggregator
//!     4. acknowledge
//!
//! ```text
//!     if step 2 fails the aggregator is left alone and the caller gets a
//!     server error. retrying is up to the caller.
//! ```
//!
//! ==============================================================================

use crate::domain::{now_ms, Reading, ReadingId, DEFAULT_SERIES_ID};
use crate::error::{HubError, HubResult};
use crate::hub::Hub;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// raw submission body
///
/// older sensor firmware posts `{"device_id": .., "temperature": ..}`,
/// both spellings are accepted.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Submission {
    #[serde(default, alias = "device_id")]
    pub series_id: Option<String>,

    /// kept as a raw json value so a non-numeric value is a validation
    /// error instead of a body rejection
    #[serde(default, alias = "temperature")]
    pub value: Option<Value>,

    /// integer epoch milliseconds, the server clock is used when absent
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

/// a submission that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub series_id: String,
    pub value: f64,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Acknowledgement {
    pub status: &'static str,
    pub id: ReadingId,
    pub series_id: String,
    pub timestamp_ms: u64,
}

impl Submission {
    pub fn new(series_id: Option<&str>, value: f64) -> Self {
        Self {
            series_id: series_id.map(str::to_string),
            value: Some(Value::from(value)),
            timestamp_ms: None,
        }
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// check fields and fill defaults, `now` stands in for a missing timestamp
    pub fn validate(self, now: u64) -> HubResult<ValidSubmission> {
        let value = match self.value {
            None | Some(Value::Null) => {
                return Err(HubError::Validation("missing field: value".to_string()))
            }
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| HubError::Validation(format!("value {} is not representable", n)))?,
            Some(other) => {
                return Err(HubError::Validation(format!("value must be a number, got {}", other)))
            }
        };

        if !value.is_finite() {
            return Err(HubError::Validation("value must be finite".to_string()));
        }

        let series_id = match self.series_id {
            None => DEFAULT_SERIES_ID.to_string(),
            Some(id) => {
                let id = id.trim();
                if id.is_empty() {
                    return Err(HubError::Validation("series_id must not be empty".to_string()));
                }
                id.to_string()
            }
        };

        let timestamp_ms = self.timestamp_ms.unwrap_or(now);
        if i64::try_from(timestamp_ms).is_err() {
            return Err(HubError::Validation(format!("timestamp {} out of range", timestamp_ms)));
        }

        Ok(ValidSubmission { series_id, value, timestamp_ms })
    }
}

impl Hub {
    /// validate and accept one reading
    pub async fn submit(&self, submission: Submission) -> HubResult<Acknowledgement> {
        let valid = submission.validate(now_ms())?;

        // run the write on its own task: if the caller goes away mid-request
        // the append and the aggregator update still happen together
        let hub = self.clone();
        tokio::spawn(async move { hub.append_and_observe(valid).await }).await?
    }

    async fn append_and_observe(&self, valid: ValidSubmission) -> HubResult<Acknowledgement> {
        let _write = self.inner.write_lock.lock().await;

        let store = self.inner.store.clone();
        let (series_id, value, timestamp_ms) = (valid.series_id.clone(), valid.value, valid.timestamp_ms);
        let appended =
            tokio::task::spawn_blocking(move || store.append(&series_id, value, timestamp_ms)).await;

        let id = match appended {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                tracing::error!(series_id = %valid.series_id, error = %e, "append failed, reading dropped");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(series_id = %valid.series_id, error = %e, "append task failed");
                return Err(e.into());
            }
        };

        let reading = Reading {
            id,
            series_id: valid.series_id,
            value: valid.value,
            timestamp_ms: valid.timestamp_ms,
        };

        let summary = self.inner.aggregator.write().await.observe(&reading);

        tracing::debug!(
            series_id = %reading.series_id,
            value = reading.value,
            min = summary.min,
            max = summary.max,
            count = summary.count,
            "reading accepted"
        );

        Ok(Acknowledgement {
            status: "ok",
            id: reading.id,
            series_id: reading.series_id,
            timestamp_ms: reading.timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SeriesSummary;
    use crate::store::{ReadingStore, SqliteStore};
    use serde_json::json;
    use std::sync::Arc;

    fn parse(body: Value) -> Submission {
        serde_json::from_value(body).unwrap()
    }

    async fn memory_hub() -> Hub {
        Hub::open(Arc::new(SqliteStore::open_in_memory().unwrap())).await.unwrap()
    }

    // a store whose appends always fail, reads see nothing
    struct BrokenStore;

    impl ReadingStore for BrokenStore {
        fn append(&self, _: &str, _: f64, _: u64) -> HubResult<ReadingId> {
            Err(HubError::Storage("disk full".to_string()))
        }

        fn scan(&self, _: Option<&str>, _: &mut dyn FnMut(Reading)) -> HubResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_series_id_defaults() {
        let valid = parse(json!({"value": 21.0})).validate(5).unwrap();
        assert_eq!(valid.series_id, "default");
        assert_eq!(valid.timestamp_ms, 5);
    }

    #[test]
    fn test_device_payload_aliases() {
        let valid = parse(json!({"device_id": "esp32", "temperature": 19.5})).validate(0).unwrap();
        assert_eq!(valid.series_id, "esp32");
        assert_eq!(valid.value, 19.5);
    }

    #[test]
    fn test_client_timestamp_is_kept() {
        let valid = parse(json!({"value": 1, "timestamp_ms": 42})).validate(99).unwrap();
        assert_eq!(valid.timestamp_ms, 42);
        assert_eq!(valid.value, 1.0);
    }

    #[test]
    fn test_bare_timestamp_field_is_ignored() {
        // devices often post float epoch seconds as "timestamp"
        let valid = parse(json!({"value": 2.0, "timestamp": 1700000000.5})).validate(77).unwrap();
        assert_eq!(valid.timestamp_ms, 77);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for body in [
            json!({}),
            json!({"value": null}),
            json!({"value": "hot"}),
            json!({"value": [1, 2]}),
            json!({"series_id": "  ", "value": 1.0}),
        ] {
            let err = parse(body.clone()).validate(0).unwrap_err();
            assert!(matches!(err, HubError::Validation(_)), "{} should be rejected", body);
        }
    }

    #[tokio::test]
    async fn test_submit_updates_summary() {
        let hub = memory_hub().await;

        let ack = hub.submit(Submission::new(Some("a"), 10.0)).await.unwrap();
        assert_eq!(ack.status, "ok");
        assert_eq!(ack.series_id, "a");

        hub.submit(Submission::new(Some("a"), 30.0)).await.unwrap();

        let summary = hub.inner.aggregator.read().await.snapshot("a").unwrap();
        assert_eq!(
            summary,
            SeriesSummary { series_id: "a".to_string(), latest: 30.0, min: 10.0, max: 30.0, count: 2 }
        );
    }

    #[tokio::test]
    async fn test_validation_failure_mutates_nothing() {
        let hub = memory_hub().await;

        let err = hub.submit(parse(json!({"series_id": "a"}))).await.unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));

        assert_eq!(hub.series_count().await, 0);
        assert!(hub.inner.store.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_value_leaves_existing_series_unchanged() {
        let hub = memory_hub().await;
        hub.submit(Submission::new(Some("a"), 4.0)).await.unwrap();
        hub.submit(Submission::new(Some("a"), 6.0)).await.unwrap();

        for body in [json!({"series_id": "a"}), json!({"series_id": "a", "value": null})] {
            let err = hub.submit(parse(body)).await.unwrap_err();
            assert!(matches!(err, HubError::Validation(_)));
        }

        let summary = hub.get_snapshot().await["a"].clone();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.latest, 6.0);
        assert_eq!(hub.get_history("a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_aggregator_untouched() {
        let hub = Hub::open(Arc::new(BrokenStore)).await.unwrap();

        let err = hub.submit(Submission::new(Some("a"), 1.0)).await.unwrap_err();
        assert!(matches!(err, HubError::Storage(_)));
        assert!(hub.inner.aggregator.read().await.snapshot("a").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_submits_lose_nothing() {
        let hub = memory_hub().await;

        let mut handles = Vec::new();
        for i in 0..50 {
            let hub = hub.clone();
            handles.push(tokio::spawn(async move {
                hub.submit(Submission::new(Some("shared"), i as f64)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let summary = hub.inner.aggregator.read().await.snapshot("shared").unwrap();
        assert_eq!(summary.count, 50);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 49.0);
        assert_eq!(hub.inner.store.list_by_series("shared").unwrap().len(), 50);
    }
}
