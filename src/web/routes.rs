use super::handlers;
use super::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Public feed
        .route("/api/posts", get(handlers::posts::feed))
        .route("/api/posts/by-tag/:tag_slug", get(handlers::posts::feed_by_tag))
        .route("/api/posts/:slug", get(handlers::posts::show))
        // Accounts and sessions
        .route("/api/register", post(handlers::users::register))
        .route("/api/login", post(handlers::users::login))
        .route("/api/logout", get(handlers::users::logout))
        .route("/api/user", get(handlers::users::current))
        .route("/api/name-is-free", post(handlers::users::name_is_free))
        .route("/api/email-is-free", post(handlers::users::email_is_free))
        .route("/api/user/check-password", post(handlers::users::check_password))
        .route("/api/user/update-password", post(handlers::users::update_password))
        .route(
            "/api/user/avatar",
            post(handlers::users::set_avatar).delete(handlers::users::delete_avatar),
        )
        // Avatar images
        .route(
            "/api/avatars",
            get(handlers::images::list_avatars).post(handlers::images::store_avatar),
        )
        .route("/api/avatars/:id", delete(handlers::images::destroy_avatar))
        // Admin: posts
        .route(
            "/api/admin/posts",
            get(handlers::posts::list_for_admin).post(handlers::posts::store),
        )
        .route(
            "/api/admin/posts/:slug",
            get(handlers::posts::show_for_admin)
                .post(handlers::posts::update)
                .delete(handlers::posts::destroy),
        )
        // Admin: post images
        .route("/api/images/post/:post_id", get(handlers::images::list_for_post))
        .route("/api/images", post(handlers::images::store))
        .route("/api/images/:id", delete(handlers::images::destroy))
        // Deliberately unauthenticated so a client can clean up an
        // abandoned upload session even after its login expired.
        .route("/api/images/clear", post(handlers::images::clear))
        // Admin: tags
        .route(
            "/api/admin/tags",
            get(handlers::tags::list).post(handlers::tags::store),
        )
        .route("/api/admin/tags/check-name", post(handlers::tags::check_name))
        .route(
            "/api/admin/tags/:id",
            post(handlers::tags::update).delete(handlers::tags::destroy),
        )
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
}
