use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::model::ProductionProgress;
use crate::service::StartProduction;
use super::{ok_json, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/produce", post(start_production))
        .route("/batches/{batch_id}/progress", get(get_progress))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProduceBody {
    operator: String,
}

/// Trigger production for an approved order.
///
/// Preconditions are checked synchronously; the order is
/// `PRODUCTION_QUEUED` before this returns. The batch itself runs on a
/// blocking worker; failures are recorded on the order and logged by
/// the engine, discoverable by polling.
async fn start_production(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ProduceBody>,
) -> Result<Json<StartProduction>, ApiError> {
    let resp = svc
        .start_production(&id, &body.operator)
        .map_err(ApiError::from)?;

    let svc = svc.clone();
    let order_id = id.clone();
    let batch_id = resp.batch_id.clone();
    tokio::task::spawn_blocking(move || {
        // Failures land on the order entity and in the engine's logs.
        let _ = svc.run_production(&order_id, &batch_id);
    });

    Ok(Json(resp))
}

/// Progress poll response. `exists: false` is the normal "no active
/// batch" answer, not an error.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressResponse {
    exists: bool,
    #[serde(flatten)]
    progress: Option<ProductionProgress>,
}

async fn get_progress(
    State(svc): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    ok_json(svc.get_progress(&batch_id).map(|p| ProgressResponse {
        exists: p.is_some(),
        progress: p,
    }))
}
