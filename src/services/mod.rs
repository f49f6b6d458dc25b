pub mod auth;
pub mod images;
pub mod posts;
pub mod slug;
pub mod storage;
pub mod tags;
