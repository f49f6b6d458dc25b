use crate::models::{Post, PostWithImages, PostWithTags, StorePost, Tag, UpdatePost, User, UserSummary};
use crate::services::storage::Storage;
use crate::services::{images, slug};
use crate::web::error::{ApiError, ApiResult};
use crate::Database;
use rusqlite::{OptionalExtension, Transaction};

const POST_COLUMNS: &str = "id, title, slug, excerpt_raw, excerpt_html, content_raw, \
                            content_html, is_published, published_at, image_path, user_id, \
                            created_at, updated_at";

/// Create/update results distinguish the slug soft conflict from real
/// failures: a taken slug is a normal outcome, not an [`ApiError`].
#[derive(Debug)]
pub enum CreateOutcome {
    Created(i64),
    SlugTaken,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Box<PostWithImages>),
    SlugTaken,
}

/// Creates a post and, when an upload-session folder was supplied, links
/// that folder's images to it. Both run inside one transaction, so a
/// failed linkage rolls the post back and nothing partially-linked is ever
/// visible.
pub fn create_post(
    db: &Database,
    input: &StorePost,
    image_counter: i64,
    author_id: i64,
) -> ApiResult<CreateOutcome> {
    let post_slug = slug::post_slug(&input.title, input.slug.as_deref());
    if slug::post_slug_taken(db, &post_slug, None)? {
        return Ok(CreateOutcome::SlugTaken);
    }

    let published_at = input
        .is_published
        .then(|| chrono::Utc::now().to_rfc3339());

    let mut conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let tx = conn.transaction().map_err(ApiError::from)?;

    tx.execute(
        "INSERT INTO posts (title, slug, excerpt_raw, excerpt_html, content_raw, content_html, \
         is_published, published_at, image_path, user_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &input.title,
            &post_slug,
            &input.excerpt_raw,
            &input.excerpt_html,
            &input.content_raw,
            &input.content_html,
            input.is_published,
            &published_at,
            &input.image_path,
            author_id,
        ),
    )
    .map_err(|e| {
        tracing::warn!("posts::create_post: Failed saving to the DB: {}", e);
        ApiError::db("Failed saving to the DB")
    })?;
    let post_id = tx.last_insert_rowid();

    if let Some(path) = input.image_path.as_deref().filter(|p| !p.is_empty()) {
        if image_counter > 0 {
            attach_images(&tx, post_id, path)?;
        }
    }

    tx.commit().map_err(|e| {
        tracing::warn!("posts::create_post: Failed saving to the DB: {}", e);
        ApiError::db("Failed saving to the DB")
    })?;

    tracing::info!("Post #{} has been created by user #{}", post_id, author_id);
    Ok(CreateOutcome::Created(post_id))
}

/// Completes the image/post link for an upload-session folder. Images are
/// pre-marked attached at upload time with no post id; this fills it in,
/// one row at a time.
fn attach_images(tx: &Transaction, post_id: i64, path: &str) -> ApiResult<()> {
    let ids: Vec<i64> = tx
        .prepare("SELECT id FROM images WHERE attached_to_post = 1 AND path = ?")?
        .query_map([path], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        tracing::warn!(
            "posts::attach_images: images from the directory {} were not found in the DB",
            path
        );
        return Err(ApiError::not_found(format!(
            "images from the directory {} were not found in the DB",
            path
        )));
    }

    for id in ids {
        tx.execute("UPDATE images SET post_id = ? WHERE id = ?", (post_id, id))?;
    }
    Ok(())
}

pub fn update_post(db: &Database, id: i64, input: &UpdatePost) -> ApiResult<UpdateOutcome> {
    let current = get_post(db, id)?.ok_or_else(|| ApiError::not_found("Post was not found"))?;

    let post_slug = slug::post_slug(&input.title, input.slug.as_deref());
    if slug::post_slug_taken(db, &post_slug, Some(id))? {
        return Ok(UpdateOutcome::SlugTaken);
    }

    // First publish stamps published_at; it never moves afterwards.
    let published_at = if input.is_published && current.published_at.is_none() {
        Some(chrono::Utc::now().to_rfc3339())
    } else {
        current.published_at
    };

    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute(
        "UPDATE posts SET title = ?, slug = ?, excerpt_raw = ?, excerpt_html = ?, \
         content_raw = ?, content_html = ?, is_published = ?, published_at = ?, \
         image_path = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        (
            &input.title,
            &post_slug,
            &input.excerpt_raw,
            &input.excerpt_html,
            &input.content_raw,
            &input.content_html,
            input.is_published,
            &published_at,
            &input.image_path,
            id,
        ),
    )
    .map_err(|e| {
        tracing::warn!("posts::update_post: Failed to update post #{} to the DB: {}", id, e);
        ApiError::db(format!("Failed to update post #{} to the DB", id))
    })?;

    tracing::info!("posts::update_post: post #{} updated successfully", id);

    let post = get_post(db, id)?.ok_or_else(|| ApiError::not_found("Post was not found"))?;
    let post_images = images::list_for_post(db, id)?;
    Ok(UpdateOutcome::Updated(Box::new(PostWithImages {
        post,
        images: post_images,
    })))
}

/// Deletion order: dependent image rows, then the storage folder, then tag
/// associations, then the post row. An already-absent folder is logged and
/// skipped; a failed delete of an existing folder aborts the request.
pub fn delete_post(db: &Database, storage: &Storage, id: i64, actor: &User) -> ApiResult<String> {
    let post = get_post(db, id)?.ok_or_else(|| ApiError::not_found("Post was not found"))?;
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;

    // An earlier update may have repointed image_path; linked rows keep
    // their post_id regardless of folder, so they are removed by id too.
    conn.execute("DELETE FROM images WHERE post_id = ?", [id])
        .map_err(|e| {
            tracing::error!(
                "posts::delete_post({}): Failed deleting DB records of attached images: {}",
                id, e
            );
            ApiError::db(format!(
                "Failed deleting DB records of images of post #{}",
                id
            ))
        })?;

    if let Some(path) = post.image_path.as_deref().filter(|p| !p.is_empty()) {
        conn.execute("DELETE FROM images WHERE path = ?", [path])
            .map_err(|e| {
                tracing::error!(
                    "posts::delete_post({}): Failed deleting DB records of images from directory {}: {}",
                    id, path, e
                );
                ApiError::db(format!(
                    "Failed deleting DB records of images from directory {}",
                    path
                ))
            })?;

        if !storage.folder_exists(path) {
            tracing::error!("posts::delete_post({}): directory {} was not found", id, path);
        } else if let Err(e) = storage.delete_folder(path) {
            tracing::error!(
                "posts::delete_post({}): Failed to delete directory {}",
                id, path
            );
            return Err(e);
        }
    }

    let tag_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM post_tags WHERE post_id = ?",
        [id],
        |row| row.get(0),
    )?;
    if tag_count > 0 {
        conn.execute("DELETE FROM post_tags WHERE post_id = ?", [id])
            .map_err(|e| {
                tracing::error!(
                    "posts::delete_post({}): Failed deleting entries about related tags: {}",
                    id, e
                );
                ApiError::db(format!(
                    "Failed deleting entries about related tags of post #{}",
                    id
                ))
            })?;
    }

    conn.execute("DELETE FROM posts WHERE id = ?", [id])
        .map_err(|e| {
            tracing::error!("posts::delete_post({}): Failed deleting DB record of post: {}", id, e);
            ApiError::db(format!("Failed deleting DB record of post #{}", id))
        })?;

    tracing::info!(
        "Post #{} has been deleted by the {} #{}",
        id, actor.name, actor.id
    );
    Ok(format!("Post #{} has been successfully deleted", id))
}

pub fn get_post(db: &Database, id: i64) -> ApiResult<Option<Post>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS),
            [id],
            row_to_post,
        )
        .optional()?;
    Ok(post)
}

/// Admin routes address a post by numeric id or slug interchangeably; a
/// digits-only string is tried as an id first.
pub fn find_by_slug_or_id(db: &Database, key: &str) -> ApiResult<Option<Post>> {
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(id) = key.parse::<i64>() {
            if let Some(post) = get_post(db, id)? {
                return Ok(Some(post));
            }
        }
    }

    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE slug = ?", POST_COLUMNS),
            [key],
            row_to_post,
        )
        .optional()?;
    Ok(post)
}

/// Public feed: published posts, newest publication first.
pub fn feed(db: &Database, limit: usize, offset: usize) -> ApiResult<(Vec<PostWithTags>, i64)> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE is_published = 1",
        [],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts WHERE is_published = 1 \
         ORDER BY published_at DESC LIMIT ? OFFSET ?",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map((limit, offset), row_to_post)?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);
    drop(conn);

    let enriched = posts
        .into_iter()
        .map(|p| enrich_post(db, p))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok((enriched, total))
}

pub fn feed_by_tag(
    db: &Database,
    tag_slug: &str,
    limit: usize,
    offset: usize,
) -> ApiResult<(Vec<PostWithTags>, i64)> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts p \
         JOIN post_tags pt ON p.id = pt.post_id \
         JOIN tags t ON pt.tag_id = t.id \
         WHERE t.slug = ? AND p.is_published = 1",
        [tag_slug],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT p.{} FROM posts p \
         JOIN post_tags pt ON p.id = pt.post_id \
         JOIN tags t ON pt.tag_id = t.id \
         WHERE t.slug = ? AND p.is_published = 1 \
         ORDER BY p.published_at DESC LIMIT ? OFFSET ?",
        POST_COLUMNS.replace(", ", ", p.")
    ))?;
    let posts = stmt
        .query_map((tag_slug, limit, offset), row_to_post)?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);
    drop(conn);

    let enriched = posts
        .into_iter()
        .map(|p| enrich_post(db, p))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok((enriched, total))
}

/// Admin panel list: every post, newest first.
pub fn list_for_admin(
    db: &Database,
    limit: usize,
    offset: usize,
) -> ApiResult<(Vec<PostWithTags>, i64)> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts ORDER BY id DESC LIMIT ? OFFSET ?",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map((limit, offset), row_to_post)?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);
    drop(conn);

    let enriched = posts
        .into_iter()
        .map(|p| enrich_post(db, p))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok((enriched, total))
}

pub fn enrich_post(db: &Database, post: Post) -> ApiResult<PostWithTags> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;

    let mut tag_stmt = conn.prepare(
        "SELECT t.id, t.name, t.name_low_case, t.slug, t.created_at \
         FROM tags t JOIN post_tags pt ON t.id = pt.tag_id WHERE pt.post_id = ?",
    )?;
    let tags: Vec<Tag> = tag_stmt
        .query_map([post.id], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
                name_low_case: row.get(2)?,
                slug: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let author = conn
        .query_row(
            "SELECT id, name FROM users WHERE id = ?",
            [post.user_id],
            |row| {
                Ok(UserSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;

    Ok(PostWithTags { post, tags, author })
}

pub(crate) fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        excerpt_raw: row.get(3)?,
        excerpt_html: row.get(4)?,
        content_raw: row.get(5)?,
        content_html: row.get(6)?,
        is_published: row.get(7)?,
        published_at: row.get(8)?,
        image_path: row.get(9)?,
        user_id: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
