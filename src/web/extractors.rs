use crate::models::User;
use crate::services::auth;
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "session";

fn session_user(state: &AppState, parts: &Parts) -> Result<Option<User>, ApiError> {
    let cookies = CookieJar::from_headers(&parts.headers);
    let token = match cookies.get(SESSION_COOKIE) {
        Some(c) => c.value().to_string(),
        None => return Ok(None),
    };
    auth::validate_session(&state.db, &token)
}

pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let result = session_user(state, parts)
            .and_then(|user| user.ok_or(ApiError::Unauthenticated))
            .map(CurrentUser);
        Box::pin(async move { result })
    }
}

pub struct OptionalUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for OptionalUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let result = session_user(state, parts).map(OptionalUser);
        Box::pin(async move { result })
    }
}

/// The capability gate for every admin-only operation: authenticated
/// session plus `is_admin`. Using it as an argument replaces the
/// per-handler inline checks; the failure semantics stay 401/403.
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let result = session_user(state, parts)
            .and_then(|user| user.ok_or(ApiError::Unauthenticated))
            .and_then(|user| {
                if user.is_admin {
                    Ok(AdminUser(user))
                } else {
                    Err(ApiError::AccessDenied)
                }
            });
        Box::pin(async move { result })
    }
}
