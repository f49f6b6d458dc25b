pub mod images;
pub mod posts;
pub mod tags;
pub mod users;

use axum::response::Json;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct PaginationParams {
    pub page: Option<usize>,
}

pub(crate) fn paginate(page: Option<usize>, per_page: usize) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    // The page number is client-supplied; saturate instead of overflowing.
    let offset = page.saturating_sub(1).saturating_mul(per_page);
    (page, offset)
}

pub(crate) fn json_page(
    data: serde_json::Value,
    total: i64,
    page: usize,
    per_page: usize,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "data": data,
        "meta": {
            "total": total,
            "page": page,
            "per_page": per_page,
        }
    }))
}
