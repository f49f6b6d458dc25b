use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub id: i64,
    pub file_name: String,
    /// Upload-session folder shared by all images uploaded together.
    pub path: String,
    pub attached_to_post: bool,
    pub post_id: Option<i64>,
    pub user_id: i64,
    pub created_at: String,
}
