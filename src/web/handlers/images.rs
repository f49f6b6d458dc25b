use crate::services::images;
use crate::web::error::{ApiError, ApiResult};
use crate::web::extractors::{AdminUser, CurrentUser};
use crate::web::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Multipart fields collected from an upload request. `image_folder` is
/// only meaningful for post images: it keeps every upload of one editing
/// session in the same folder.
struct Upload {
    folder: Option<String>,
    file_name: Option<String>,
    data: Option<Vec<u8>>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut upload = Upload {
        folder: None,
        file_name: None,
        data: None,
    };
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("image_folder") => upload.folder = Some(field.text().await?),
            Some("image") => {
                upload.file_name = field.file_name().map(|n| n.to_string());
                upload.data = Some(field.bytes().await?.to_vec());
            }
            _ => {}
        }
    }
    Ok(upload)
}

/// POST /api/images — stores one upload-session image for a post draft.
pub async fn store(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let upload = read_upload(multipart).await?;
    let data = upload
        .data
        .ok_or_else(|| ApiError::bad_request("Bad request: image file is required"))?;
    let file_name = upload.file_name.unwrap_or_default();

    let image = images::store_post_image(
        &state.db,
        &state.storage,
        user.id,
        upload.folder,
        &file_name,
        &data,
    )?;
    Ok(Json(json!(image)))
}

/// GET /api/images/post/:post_id
pub async fn list_for_post(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let list = images::list_for_post(&state.db, post_id)?;
    Ok(Json(json!(list)))
}

/// DELETE /api/images/:id
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<bool>> {
    images::delete_image(&state.db, &state.storage, id)?;
    Ok(Json(true))
}

#[derive(Deserialize)]
pub struct ClearImages {
    pub image_path: String,
}

/// POST /api/images/clear — drops every image of an abandoned upload
/// session. No session required: a stale editor tab must be able to clean
/// up after its login expired. Only never-attached rows are touched.
pub async fn clear(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ClearImages>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = images::clear_unattached(&state.db, &state.storage, &input.image_path)?;
    Ok(Json(json!({ "removed": removed })))
}

/// GET /api/avatars — the caller's own avatar uploads.
pub async fn list_avatars(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let list = images::list_avatars(&state.db, user.id)?;
    Ok(Json(json!(list)))
}

/// POST /api/avatars
pub async fn store_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let upload = read_upload(multipart).await?;
    let data = upload
        .data
        .ok_or_else(|| ApiError::bad_request("Bad request: image file is required"))?;
    let file_name = upload.file_name.unwrap_or_default();

    let image = images::store_avatar(&state.db, &state.storage, user.id, &file_name, &data)?;
    Ok(Json(json!(image)))
}

/// DELETE /api/avatars/:id — owners only.
pub async fn destroy_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<bool>> {
    let image =
        images::get_image(&state.db, id)?.ok_or_else(|| ApiError::not_found("Image was not found"))?;
    if image.user_id != user.id {
        return Err(ApiError::AccessDenied);
    }
    if image.attached_to_post {
        return Err(ApiError::bad_request(
            "Bad request: a post image cannot be deleted here",
        ));
    }
    images::delete_image(&state.db, &state.storage, id)?;
    Ok(Json(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Database};

    fn test_state() -> Arc<AppState> {
        use rand::Rng;
        let id: u32 = rand::thread_rng().gen();
        let db = Database::open_memory(&format!("handler_test_{}", id)).unwrap();
        db.migrate().unwrap();
        let config: Config = toml::from_str(
            r#"
            [server]

            [database]
            path = ":memory:"

            [storage]
            upload_dir = "./data/uploads-test"
            "#,
        )
        .unwrap();
        Arc::new(AppState::new(config, db))
    }

    // The cleanup handler carries no session extractor on purpose: a client
    // whose login expired must still be able to purge its upload session.
    #[tokio::test]
    async fn test_clear_works_without_a_session() {
        let state = test_state();
        let result = clear(
            State(state),
            Json(ClearImages {
                image_path: "posts/abandoned-session".to_string(),
            }),
        )
        .await;
        assert!(result.is_ok());
    }
}
