use crate::models::{Tag, User};
use crate::services::slug::{derive_slug, ensure_tag_name_free};
use crate::web::error::{ApiError, ApiResult};
use crate::Database;
use rusqlite::OptionalExtension;

const TAG_COLUMNS: &str = "id, name, name_low_case, slug, created_at";

pub fn create_tag(db: &Database, name: &str, actor: &User) -> ApiResult<Tag> {
    let name = name.trim();
    let tag_slug = derive_slug(name);
    ensure_tag_name_free(db, name, &tag_slug, None)?;

    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute(
        "INSERT INTO tags (name, name_low_case, slug) VALUES (?, ?, ?)",
        (name, name.to_lowercase(), &tag_slug),
    )
    .map_err(|e| {
        tracing::warn!("tags::create_tag: Failed saving to the DB: {}", e);
        ApiError::db("Failed saving to the DB")
    })?;
    let id = conn.last_insert_rowid();
    drop(conn);

    let tag = get_tag(db, id)?.ok_or_else(|| ApiError::not_found("Tag was not found"))?;
    tracing::info!(
        "Tag `{}` #{} has been created by user #{}",
        tag.name, tag.id, actor.id
    );
    Ok(tag)
}

pub fn update_tag(db: &Database, id: i64, name: &str, actor: &User) -> ApiResult<Tag> {
    let tag = get_tag(db, id)?.ok_or_else(|| ApiError::NotFound(String::new()))?;

    let name = name.trim();
    // Renaming a tag to its current name is a no-op, no uniqueness check.
    if tag.name == name {
        return Ok(tag);
    }

    let tag_slug = derive_slug(name);
    ensure_tag_name_free(db, name, &tag_slug, Some(id))?;

    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute(
        "UPDATE tags SET name = ?, name_low_case = ?, slug = ? WHERE id = ?",
        (name, name.to_lowercase(), &tag_slug, id),
    )
    .map_err(|e| {
        tracing::warn!("tags::update_tag: Failed saving to the DB: {}", e);
        ApiError::db("Failed saving to the DB")
    })?;
    drop(conn);

    let tag = get_tag(db, id)?.ok_or_else(|| ApiError::not_found("Tag was not found"))?;
    tracing::info!(
        "Tag `{}` #{} has been updated by user #{}",
        tag.name, tag.id, actor.id
    );
    Ok(tag)
}

/// Probe used by the admin UI while typing; an existing id can be excluded
/// so a tag does not collide with itself.
pub fn check_name_free(db: &Database, name: &str, exclude_id: Option<i64>) -> ApiResult<()> {
    let name = name.trim();
    let tag_slug = derive_slug(name);
    ensure_tag_name_free(db, name, &tag_slug, exclude_id)
}

pub fn delete_tag(db: &Database, id: i64, actor: &User) -> ApiResult<String> {
    let tag = get_tag(db, id)?.ok_or_else(|| ApiError::NotFound(String::new()))?;
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;

    let post_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM post_tags WHERE tag_id = ?",
        [id],
        |row| row.get(0),
    )?;
    if post_count > 0 {
        conn.execute("DELETE FROM post_tags WHERE tag_id = ?", [id])
            .map_err(|e| {
                tracing::error!(
                    "tags::delete_tag({}): Failed deleting entries about related posts: {}",
                    id, e
                );
                ApiError::db(format!(
                    "Failed deleting entries about related posts of tag #{}",
                    id
                ))
            })?;
    }

    conn.execute("DELETE FROM tags WHERE id = ?", [id])
        .map_err(|e| {
            tracing::error!("tags::delete_tag({}): Failed deleting DB record of tag: {}", id, e);
            ApiError::db(format!("Failed deleting DB record of tag #{}", id))
        })?;

    tracing::info!(
        "Tag `{}` #{} has been deleted by the {} #{}",
        tag.name, tag.id, actor.name, actor.id
    );
    Ok(format!("Tag #{} has been successfully deleted", id))
}

pub fn get_tag(db: &Database, id: i64) -> ApiResult<Option<Tag>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let tag = conn
        .query_row(
            &format!("SELECT {} FROM tags WHERE id = ?", TAG_COLUMNS),
            [id],
            row_to_tag,
        )
        .optional()?;
    Ok(tag)
}

pub fn get_tag_by_slug(db: &Database, slug: &str) -> ApiResult<Option<Tag>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let tag = conn
        .query_row(
            &format!("SELECT {} FROM tags WHERE slug = ?", TAG_COLUMNS),
            [slug],
            row_to_tag,
        )
        .optional()?;
    Ok(tag)
}

/// Admin tag list, newest first.
pub fn list_tags(db: &Database, limit: usize, offset: usize) -> ApiResult<(Vec<Tag>, i64)> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tags ORDER BY id DESC LIMIT ? OFFSET ?",
        TAG_COLUMNS
    ))?;
    let tags = stmt
        .query_map((limit, offset), row_to_tag)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok((tags, total))
}

pub(crate) fn row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        name_low_case: row.get(2)?,
        slug: row.get(3)?,
        created_at: row.get(4)?,
    })
}
