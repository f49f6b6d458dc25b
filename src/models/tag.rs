use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub name_low_case: String,
    pub slug: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct StoreTag {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckTagName {
    pub name: String,
    pub tag_id: Option<i64>,
}
