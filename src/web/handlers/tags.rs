use crate::models::{CheckTagName, StoreTag};
use crate::services::tags;
use crate::web::error::ApiResult;
use crate::web::extractors::AdminUser;
use crate::web::handlers::{json_page, paginate, PaginationParams};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde_json::json;
use std::sync::Arc;

/// GET /api/admin/tags
pub async fn list(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let per_page = state.config.content.tags_per_page;
    let (page, offset) = paginate(params.page, per_page);

    let (tags, total) = tags::list_tags(&state.db, per_page, offset)?;
    Ok(json_page(json!(tags), total, page, per_page))
}

/// POST /api/admin/tags/check-name — 422 on collision, `true` otherwise.
pub async fn check_name(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
    Json(input): Json<CheckTagName>,
) -> ApiResult<Json<bool>> {
    tags::check_name_free(&state.db, &input.name, input.tag_id)?;
    Ok(Json(true))
}

/// POST /api/admin/tags
pub async fn store(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    Json(input): Json<StoreTag>,
) -> ApiResult<Json<serde_json::Value>> {
    let tag = tags::create_tag(&state.db, &input.name, &user)?;
    Ok(Json(json!(tag)))
}

/// POST /api/admin/tags/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
    Json(input): Json<StoreTag>,
) -> ApiResult<Json<serde_json::Value>> {
    let tag = tags::update_tag(&state.db, id, &input.name, &user)?;
    Ok(Json(json!(tag)))
}

/// DELETE /api/admin/tags/:id
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let message = tags::delete_tag(&state.db, id, &user)?;
    Ok(Json(json!([message])))
}
