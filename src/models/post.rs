use super::{Image, Tag, UserSummary};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt_raw: String,
    pub excerpt_html: String,
    pub content_raw: String,
    pub content_html: String,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub image_path: Option<String>,
    pub user_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Feed/detail response shape.
#[derive(Debug, Clone, Serialize)]
pub struct PostWithTags {
    #[serde(flatten)]
    pub post: Post,
    pub tags: Vec<Tag>,
    pub author: Option<UserSummary>,
}

/// Admin edit response shape: the post plus the images of its upload folder.
#[derive(Debug, Clone, Serialize)]
pub struct PostWithImages {
    pub post: Post,
    pub images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
pub struct StorePost {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt_raw: String,
    #[serde(default)]
    pub excerpt_html: String,
    #[serde(default)]
    pub content_raw: String,
    #[serde(default)]
    pub content_html: String,
    #[serde(default)]
    pub is_published: bool,
    pub image_path: Option<String>,
    /// Number of images the client uploaded for this post. Required on
    /// create; zero means nothing to attach.
    pub image_counter: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePost {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt_raw: String,
    #[serde(default)]
    pub excerpt_html: String,
    #[serde(default)]
    pub content_raw: String,
    #[serde(default)]
    pub content_html: String,
    #[serde(default)]
    pub is_published: bool,
    pub image_path: Option<String>,
}
