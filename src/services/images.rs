use crate::models::Image;
use crate::services::storage::Storage;
use crate::web::error::{ApiError, ApiResult};
use crate::Database;
use rusqlite::OptionalExtension;
use uuid::Uuid;

pub const MAX_IMAGE_SIZE: usize = 1024 * 1024;
pub const MAX_IMAGE_NAME_LENGTH: usize = 40;

const ALLOWED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

const IMAGE_COLUMNS: &str =
    "id, file_name, path, attached_to_post, post_id, user_id, created_at";

/// Fresh upload-session folder for a post draft. Every image the client
/// uploads while editing one draft lands in the same folder.
pub fn new_post_folder() -> String {
    format!("posts/{}", Uuid::new_v4())
}

fn new_avatar_folder() -> String {
    format!("avatars/{}", Uuid::new_v4())
}

/// Sniffs the payload instead of trusting the client's content type.
fn validate_upload(image_name: &str, data: &[u8]) -> ApiResult<&'static str> {
    if image_name.is_empty() {
        return Err(ApiError::bad_request("Bad request: image_name is required"));
    }
    if image_name.len() > MAX_IMAGE_NAME_LENGTH {
        return Err(ApiError::validation(
            "image_name",
            format!(
                "Image name must be {} characters or less",
                MAX_IMAGE_NAME_LENGTH
            ),
        ));
    }
    if data.len() > MAX_IMAGE_SIZE {
        return Err(ApiError::validation(
            "image",
            format!("Image must be {} bytes or less", MAX_IMAGE_SIZE),
        ));
    }

    let kind = infer::get(data)
        .ok_or_else(|| ApiError::validation("image", "Unrecognized image format"))?;
    if !ALLOWED_IMAGE_TYPES.contains(&kind.mime_type()) {
        return Err(ApiError::validation(
            "image",
            "Only png, jpg and webp images are allowed",
        ));
    }
    Ok(kind.extension())
}

fn insert_image(
    db: &Database,
    file_name: &str,
    path: &str,
    attached_to_post: bool,
    user_id: i64,
) -> ApiResult<Image> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute(
        "INSERT INTO images (file_name, path, attached_to_post, user_id) VALUES (?, ?, ?, ?)",
        (file_name, path, attached_to_post, user_id),
    )
    .map_err(|e| {
        tracing::warn!("images::insert_image: Failed saving to the DB: {}", e);
        ApiError::db("Failed saving to the DB")
    })?;
    let id = conn.last_insert_rowid();
    let image = conn.query_row(
        &format!("SELECT {} FROM images WHERE id = ?", IMAGE_COLUMNS),
        [id],
        row_to_image,
    )?;
    Ok(image)
}

/// Stores an image destined for a post that does not exist yet. The row is
/// pre-marked attached with no post id; post creation completes the link
/// by upload-session folder.
pub fn store_post_image(
    db: &Database,
    storage: &Storage,
    user_id: i64,
    image_folder: Option<String>,
    image_name: &str,
    data: &[u8],
) -> ApiResult<Image> {
    let ext = validate_upload(image_name, data)?;
    let folder = match image_folder {
        Some(f) if !f.is_empty() => {
            Storage::validate_folder(&f)?;
            f
        }
        _ => new_post_folder(),
    };

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    storage.save_file(&folder, &file_name, data)?;

    insert_image(db, &file_name, &folder, true, user_id)
}

pub fn store_avatar(
    db: &Database,
    storage: &Storage,
    user_id: i64,
    image_name: &str,
    data: &[u8],
) -> ApiResult<Image> {
    let ext = validate_upload(image_name, data)?;
    let folder = new_avatar_folder();
    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    storage.save_file(&folder, &file_name, data)?;

    insert_image(db, &file_name, &folder, false, user_id)
}

pub fn get_image(db: &Database, id: i64) -> ApiResult<Option<Image>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let image = conn
        .query_row(
            &format!("SELECT {} FROM images WHERE id = ?", IMAGE_COLUMNS),
            [id],
            row_to_image,
        )
        .optional()?;
    Ok(image)
}

pub fn list_for_post(db: &Database, post_id: i64) -> ApiResult<Vec<Image>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM images WHERE post_id = ? ORDER BY id",
        IMAGE_COLUMNS
    ))?;
    let images = stmt
        .query_map([post_id], row_to_image)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

pub fn list_avatars(db: &Database, user_id: i64) -> ApiResult<Vec<Image>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM images WHERE user_id = ? AND attached_to_post = 0 ORDER BY id DESC",
        IMAGE_COLUMNS
    ))?;
    let images = stmt
        .query_map([user_id], row_to_image)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Deletes one image row and its file. The folder itself stays; it may
/// still hold sibling uploads.
pub fn delete_image(db: &Database, storage: &Storage, id: i64) -> ApiResult<()> {
    let image = get_image(db, id)?.ok_or_else(|| ApiError::not_found("Image was not found"))?;

    storage.delete_file(&image.path, &image.file_name)?;

    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute("DELETE FROM images WHERE id = ?", [id])
        .map_err(|e| {
            tracing::warn!("images::delete_image({}): {}", id, e);
            ApiError::db(format!("Failed deleting DB record of image #{}", id))
        })?;
    Ok(())
}

/// Purges an upload session the client abandoned: rows in the folder that
/// never got a post, plus the folder itself once nothing attached remains.
pub fn clear_unattached(db: &Database, storage: &Storage, folder: &str) -> ApiResult<usize> {
    Storage::validate_folder(folder)?;
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;

    let removed = conn.execute(
        "DELETE FROM images WHERE path = ? AND post_id IS NULL",
        [folder],
    )?;

    let remaining: i64 = conn.query_row(
        "SELECT COUNT(*) FROM images WHERE path = ?",
        [folder],
        |row| row.get(0),
    )?;
    if remaining == 0 && storage.folder_exists(folder) {
        storage.delete_folder(folder)?;
    }

    tracing::info!(
        "images::clear_unattached: removed {} record(s) from directory {}",
        removed,
        folder
    );
    Ok(removed)
}

pub(crate) fn row_to_image(row: &rusqlite::Row) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get(0)?,
        file_name: row.get(1)?,
        path: row.get(2)?,
        attached_to_post: row.get(3)?,
        post_id: row.get(4)?,
        user_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}
