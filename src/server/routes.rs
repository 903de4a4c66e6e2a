use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopdesk_core::{
    grid_map, matches_filter, next_page, pages_of, BackupRecord, Conflict, Currency, PageStats,
    Receipt, ShopSummary,
};

use super::error::ApiError;
use super::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ServerRef {
    id: String,
    name: String,
}

pub async fn list_servers(State(state): State<AppState>) -> Json<Vec<ServerRef>> {
    Json(
        state
            .store
            .list_servers()
            .iter()
            .map(|s| ServerRef {
                id: s.id.clone(),
                name: s.name.clone(),
            })
            .collect(),
    )
}

pub async fn list_currencies(State(state): State<AppState>) -> Json<Vec<Currency>> {
    Json(state.store.list_currencies().to_vec())
}

pub async fn list_shops(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> ApiResult<Vec<ShopSummary>> {
    Ok(Json(state.store.list_shops(&server_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShopRequest {
    #[serde(default)]
    shop_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

pub async fn create_shop(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
    body: Result<Json<CreateShopRequest>, JsonRejection>,
) -> ApiResult<Receipt> {
    let Json(request) = body?;
    let shop_id = request
        .shop_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("shopId is required"))?;
    let receipt = state
        .store
        .create_shop(&server_id, &shop_id, request.title.as_deref())
        .await?;
    Ok(Json(receipt))
}

pub async fn get_shop(
    State(state): State<AppState>,
    Path((server_id, shop_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    Ok(Json(state.store.load_raw(&server_id, &shop_id).await?))
}

pub async fn save_shop(
    State(state): State<AppState>,
    Path((server_id, shop_id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Receipt> {
    let Json(document) = body?;
    Ok(Json(
        state.store.save_shop(&server_id, &shop_id, &document).await?,
    ))
}

pub async fn delete_shop(
    State(state): State<AppState>,
    Path((server_id, shop_id)): Path<(String, String)>,
) -> ApiResult<Receipt> {
    Ok(Json(state.store.delete_shop(&server_id, &shop_id).await?))
}

pub async fn list_backups(
    State(state): State<AppState>,
    Path((server_id, shop_id)): Path<(String, String)>,
) -> ApiResult<Vec<BackupRecord>> {
    Ok(Json(state.store.list_backups(&server_id, &shop_id).await?))
}

pub async fn restore_latest(
    State(state): State<AppState>,
    Path((server_id, shop_id)): Path<(String, String)>,
) -> ApiResult<Receipt> {
    Ok(Json(state.store.restore_latest(&server_id, &shop_id).await?))
}

pub async fn restore_named(
    State(state): State<AppState>,
    Path((server_id, shop_id, backup)): Path<(String, String, String)>,
) -> ApiResult<Receipt> {
    Ok(Json(
        state
            .store
            .restore_named(&server_id, &shop_id, &backup)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct GridQuery {
    page: Option<u32>,
    filter: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridResponse {
    page: u32,
    pages: Vec<u32>,
    next_page: u32,
    buckets: Vec<Vec<String>>,
    conflicts: Vec<Conflict>,
    stats: PageStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    matches: Option<Vec<String>>,
}

pub async fn shop_grid(
    State(state): State<AppState>,
    Path((server_id, shop_id)): Path<(String, String)>,
    Query(query): Query<GridQuery>,
) -> ApiResult<GridResponse> {
    let document = state.store.load_shop(&server_id, &shop_id).await?;
    let page = query.page.unwrap_or(1);
    let grid = grid_map(page, &document.entries);
    let matches = query.filter.map(|term| {
        document
            .entries
            .iter()
            .filter(|e| matches_filter(e, &term))
            .map(|e| e.id.clone())
            .collect()
    });

    Ok(Json(GridResponse {
        page,
        pages: pages_of(&document.entries),
        next_page: next_page(&document.entries),
        conflicts: grid.conflicts(),
        stats: grid.stats(),
        buckets: grid.buckets().to_vec(),
        matches,
    }))
}
