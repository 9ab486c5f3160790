use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::token::registration::RegistrationClaims;
use super::{ok_json, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tokens/registration", post(issue_token))
        .route("/tokens/registration/open", post(open_token))
}

#[derive(Serialize)]
struct IssuedToken {
    token: String,
}

async fn issue_token(State(svc): State<AppState>) -> Result<Json<IssuedToken>, ApiError> {
    ok_json(
        svc.issue_registration_token()
            .map(|token| IssuedToken { token }),
    )
}

#[derive(Deserialize)]
struct OpenBody {
    token: String,
}

async fn open_token(
    State(svc): State<AppState>,
    Json(body): Json<OpenBody>,
) -> Result<Json<RegistrationClaims>, ApiError> {
    ok_json(svc.open_registration_token(&body.token))
}
