use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::model::Stamp;
use crate::service::verify::VerifyResult;
use super::{ok_json, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stamps/{serial}", get(get_stamp))
        .route("/stamps/verify", post(verify_stamp))
}

async fn get_stamp(
    State(svc): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<Stamp>, ApiError> {
    ok_json(svc.get_stamp(&serial))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody {
    qr_code: String,
}

async fn verify_stamp(
    State(svc): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResult>, ApiError> {
    ok_json(svc.verify_qr(&body.qr_code))
}
