use crate::models::{StorePost, UpdatePost};
use crate::services::{images, posts};
use crate::web::error::{soft_conflict, ApiError, ApiResult, SLUG_TAKEN_MESSAGE};
use crate::web::extractors::{AdminUser, OptionalUser};
use crate::web::handlers::{json_page, paginate, PaginationParams};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::sync::Arc;

/// GET /api/posts
pub async fn feed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let per_page = state.config.content.posts_per_page;
    let (page, offset) = paginate(params.page, per_page);

    let (posts, total) = posts::feed(&state.db, per_page, offset)?;
    Ok(json_page(json!(posts), total, page, per_page))
}

/// GET /api/posts/by-tag/:tag_slug
pub async fn feed_by_tag(
    State(state): State<Arc<AppState>>,
    Path(tag_slug): Path<String>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let per_page = state.config.content.posts_per_page;
    let (page, offset) = paginate(params.page, per_page);

    let (posts, total) = posts::feed_by_tag(&state.db, &tag_slug, per_page, offset)?;
    Ok(json_page(json!(posts), total, page, per_page))
}

/// GET /api/posts/:slug — drafts are only visible to admins.
pub async fn show(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let post = posts::find_by_slug_or_id(&state.db, &slug)?
        .ok_or_else(|| ApiError::not_found("Post was not found"))?;

    if !post.is_published && !user.map(|u| u.is_admin).unwrap_or(false) {
        return Err(ApiError::AccessDenied);
    }

    let post = posts::enrich_post(&state.db, post)?;
    Ok(Json(json!(post)))
}

/// GET /api/admin/posts
pub async fn list_for_admin(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let per_page = state.config.content.posts_per_page;
    let (page, offset) = paginate(params.page, per_page);

    let (posts, total) = posts::list_for_admin(&state.db, per_page, offset)?;
    Ok(json_page(json!(posts), total, page, per_page))
}

/// GET /api/admin/posts/:slug — post plus its upload-folder images.
pub async fn show_for_admin(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let post = posts::find_by_slug_or_id(&state.db, &slug)?
        .ok_or_else(|| ApiError::NotFound(String::new()))?;

    let post_images = images::list_for_post(&state.db, post.id)?;
    let post = posts::enrich_post(&state.db, post)?;
    Ok(Json(json!({ "post": post, "images": post_images })))
}

/// POST /api/admin/posts
pub async fn store(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    Json(input): Json<StorePost>,
) -> ApiResult<Response> {
    let image_counter = input.image_counter.ok_or_else(|| {
        tracing::error!("posts::store: image_counter not received");
        ApiError::bad_request("Bad request: image_counter not received")
    })?;

    match posts::create_post(&state.db, &input, image_counter, user.id)? {
        posts::CreateOutcome::Created(id) => Ok(Json(id).into_response()),
        posts::CreateOutcome::SlugTaken => Ok(soft_conflict(SLUG_TAKEN_MESSAGE)),
    }
}

/// POST /api/admin/posts/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
    Path(id): Path<String>,
    Json(input): Json<UpdatePost>,
) -> ApiResult<Response> {
    let id = parse_post_id(&id)?;
    match posts::update_post(&state.db, id, &input)? {
        posts::UpdateOutcome::Updated(updated) => {
            Ok(Json(json!({ "post": updated.post, "images": updated.images })).into_response())
        }
        posts::UpdateOutcome::SlugTaken => Ok(soft_conflict(SLUG_TAKEN_MESSAGE)),
    }
}

/// DELETE /api/admin/posts/:id
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_post_id(&id)?;
    let message = posts::delete_post(&state.db, &state.storage, id, &user)?;
    Ok(Json(json!([message])))
}

fn parse_post_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("Bad request: invalid post id `{}`", raw)))
}
