use crate::web::error::{ApiError, ApiResult};
use crate::Database;
use rusqlite::OptionalExtension;
use slug::slugify;

pub const POST_SLUG_MAX: usize = 100;

pub fn derive_slug(name: &str) -> String {
    slugify(name)
}

/// Post slug: an explicit non-empty slug wins over derivation from the
/// title; either way the result is capped at [`POST_SLUG_MAX`] characters.
pub fn post_slug(title: &str, explicit: Option<&str>) -> String {
    let slug = match explicit {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => derive_slug(title),
    };
    truncate_slug(&slug, POST_SLUG_MAX)
}

fn truncate_slug(slug: &str, max: usize) -> String {
    if slug.len() <= max {
        return slug.to_string();
    }
    let mut end = max;
    while !slug.is_char_boundary(end) {
        end -= 1;
    }
    slug[..end].trim_end_matches('-').to_string()
}

/// Soft-conflict probe: does any other post already use this slug? The
/// caller turns a hit into a plain 400 body, never into an [`ApiError`].
pub fn post_slug_taken(db: &Database, slug: &str, exclude_id: Option<i64>) -> ApiResult<bool> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let count: i64 = match exclude_id {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE slug = ? AND id <> ?",
            (slug, id),
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE slug = ?",
            [slug],
            |row| row.get(0),
        )?,
    };
    Ok(count > 0)
}

/// Tag uniqueness is a hard failure, unlike the post soft conflict. The
/// name is compared before the slug.
pub fn ensure_tag_name_free(
    db: &Database,
    name: &str,
    slug: &str,
    exclude_id: Option<i64>,
) -> ApiResult<()> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let existing: Option<(String, String)> = match exclude_id {
        Some(id) => conn
            .query_row(
                "SELECT name, slug FROM tags WHERE (name = ?1 OR slug = ?2) AND id <> ?3 LIMIT 1",
                (name, slug, id),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT name, slug FROM tags WHERE name = ?1 OR slug = ?2 LIMIT 1",
                (name, slug),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
    };

    if let Some((existing_name, existing_slug)) = existing {
        if existing_name == name {
            return Err(ApiError::validation("name", "This name is already in use"));
        }
        if existing_slug == slug {
            return Err(ApiError::validation("slug", "This slug is already in use"));
        }
    }
    Ok(())
}
