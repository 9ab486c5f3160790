use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use stamp_core::{ListParams, ListResult};

use crate::model::StampOrder;
use crate::service::order::{CreateOrderInput, OrderFilters};
use super::{ok_json, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/approve", post(approve_order))
        .route("/orders/{id}/stamps", get(list_order_stamps))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderBody {
    taxpayer_id: String,
    product_id: String,
    stamp_type_id: String,
    quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderQuery {
    #[serde(flatten)]
    params: ListParams,
    status: Option<String>,
}

async fn create_order(
    State(svc): State<AppState>,
    Json(body): Json<CreateOrderBody>,
) -> Result<Json<StampOrder>, ApiError> {
    ok_json(svc.create_order(CreateOrderInput {
        taxpayer_id: body.taxpayer_id,
        product_id: body.product_id,
        stamp_type_id: body.stamp_type_id,
        quantity: body.quantity,
    }))
}

async fn get_order(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StampOrder>, ApiError> {
    ok_json(svc.get_order(&id))
}

async fn list_orders(
    State(svc): State<AppState>,
    Query(q): Query<OrderQuery>,
) -> Result<Json<ListResult<StampOrder>>, ApiError> {
    let filters = OrderFilters { status: q.status };
    ok_json(svc.list_orders(&q.params, &filters))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproveBody {
    approved_by: String,
}

async fn approve_order(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<StampOrder>, ApiError> {
    ok_json(svc.approve_order(&id, &body.approved_by))
}

async fn list_order_stamps(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<crate::model::Stamp>>, ApiError> {
    ok_json(svc.list_order_stamps(&id, &params))
}
