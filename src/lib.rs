//! reading-hub: ingests numeric sensor readings over http, keeps them in an
//! append-only sqlite log and serves per-series summaries, history and an
//! aligned matrix for charting clients.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod query;
pub mod store;

pub use domain::{HistoryPoint, Reading, ReadingId, SeriesSummary};
pub use error::{HubError, HubResult};
pub use hub::Hub;
pub use ingest::{Acknowledgement, Submission};
pub use query::AlignedMatrix;
pub use store::{ReadingStore, SqliteStore};
