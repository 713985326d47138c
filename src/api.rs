//! ==============================================================================
//! api.rs - http endpoints
//! ==============================================================================
//!
//! routes:
//!     POST /update               submit a reading (sensor nodes push here)
//!     GET  /get                  latest/min/max/count for every series
//!     GET  /history/:series_id   ordered readings for one series
//!     GET  /matrix?series=a,b    aligned matrix for charting clients
//!     GET  /health               liveness
//!
//! every body is json. errors come back as {"status": "error", "message": ..}
//! with 400 for bad submissions and 500 for storage failures.
//!
//! ==============================================================================

use crate::domain::{HistoryPoint, SeriesSummary};
use crate::error::HubError;
use crate::hub::Hub;
use crate::ingest::{Acknowledgement, Submission};
use crate::query::AlignedMatrix;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(hub: Hub) -> Router {
    Router::new()
        .route("/update", post(update_handler))
        .route("/get", get(snapshot_handler))
        .route("/history/:series_id", get(history_handler))
        .route("/matrix", get(matrix_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

#[derive(Serialize)]
pub struct SnapshotResponse {
    pub status: &'static str,
    pub series: BTreeMap<String, SeriesSummary>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub status: &'static str,
    pub series_id: String,
    pub readings: Vec<HistoryPoint>,
}

#[derive(Serialize)]
pub struct MatrixResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub matrix: AlignedMatrix,
}

#[derive(Deserialize)]
pub struct MatrixParams {
    /// comma separated series ids
    series: Option<String>,
}

/// POST /update
async fn update_handler(
    State(hub): State<Hub>,
    body: Result<Json<Submission>, JsonRejection>,
) -> Result<Json<Acknowledgement>, HubError> {
    let Json(submission) = body.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "rejected submission body");
        HubError::Validation(rejection.body_text())
    })?;

    match hub.submit(submission).await {
        Ok(ack) => Ok(Json(ack)),
        Err(e) => {
            if let HubError::Validation(ref msg) = e {
                tracing::warn!(error = %msg, "invalid submission");
            }
            Err(e)
        }
    }
}

/// GET /get
async fn snapshot_handler(State(hub): State<Hub>) -> Json<SnapshotResponse> {
    Json(SnapshotResponse {
        status: "ok",
        series: hub.get_snapshot().await,
    })
}

/// GET /history/:series_id
async fn history_handler(
    State(hub): State<Hub>,
    Path(series_id): Path<String>,
) -> Result<Json<HistoryResponse>, HubError> {
    let readings = hub.get_history(&series_id).await?;
    Ok(Json(HistoryResponse { status: "ok", series_id, readings }))
}

/// GET /matrix
async fn matrix_handler(
    State(hub): State<Hub>,
    Query(params): Query<MatrixParams>,
) -> Result<Json<MatrixResponse>, HubError> {
    // an empty list (`?series=`) means no filter
    let filter = params
        .series
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|ids| !ids.is_empty());

    let matrix = hub.get_aligned_matrix_for(filter).await?;
    Ok(Json(MatrixResponse { status: "ok", matrix }))
}

/// GET /health
async fn health_handler(State(hub): State<Hub>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "series": hub.series_count().await,
    }))
}
