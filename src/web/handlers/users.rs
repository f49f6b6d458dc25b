use crate::models::{Login, Register, UserSummary};
use crate::services::auth;
use crate::web::error::{ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, SESSION_COOKIE};
use crate::web::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use time::Duration;

fn session_cookie(token: String, days: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .max_age(Duration::days(days))
        .build()
}

/// POST /api/register — creates an account and logs it straight in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(input): Json<Register>,
) -> ApiResult<Response> {
    let user_id = auth::create_user(&state.db, &input.name, &input.email, &input.password, false)?;
    tracing::info!("User `{}` #{} has been registered", input.name, user_id);

    let days = state.config.auth.session_days;
    let token = auth::create_session(&state.db, user_id, days)?;
    let jar = jar.add(session_cookie(token, days));
    Ok((jar, Json(json!({ "id": user_id, "name": input.name }))).into_response())
}

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(input): Json<Login>,
) -> ApiResult<Response> {
    let user = auth::authenticate(&state.db, &input.email, &input.password)?
        .ok_or(ApiError::Unauthenticated)?;
    if user.is_banned {
        return Err(ApiError::AccessDenied);
    }

    let days = state.config.auth.session_days;
    let token = auth::create_session(&state.db, user.id, days)?;
    let jar = jar.add(session_cookie(token, days));
    Ok((jar, Json(json!(UserSummary::from(&user)))).into_response())
}

/// GET /api/logout
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> ApiResult<Response> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let _ = auth::delete_session(&state.db, cookie.value());
    }

    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();
    Ok((jar.remove(cookie), Json(json!(true))).into_response())
}

/// GET /api/user — the authenticated user, password hash excluded.
pub async fn current(CurrentUser(user): CurrentUser) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(json!(user)))
}

#[derive(Deserialize)]
pub struct CheckName {
    pub name: String,
    pub user_id: Option<i64>,
}

/// POST /api/name-is-free
pub async fn name_is_free(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CheckName>,
) -> ApiResult<Json<bool>> {
    Ok(Json(auth::name_is_free(&state.db, &input.name, input.user_id)?))
}

#[derive(Deserialize)]
pub struct CheckEmail {
    pub email: String,
    pub user_id: Option<i64>,
}

/// POST /api/email-is-free
pub async fn email_is_free(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CheckEmail>,
) -> ApiResult<Json<bool>> {
    Ok(Json(auth::email_is_free(&state.db, &input.email, input.user_id)?))
}

#[derive(Deserialize)]
pub struct CheckPassword {
    pub password: String,
}

/// POST /api/user/check-password — lets the settings form confirm the
/// current password before allowing a change.
pub async fn check_password(
    State(_state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CheckPassword>,
) -> ApiResult<Json<bool>> {
    Ok(Json(auth::verify_password(&input.password, &user.password_hash)))
}

#[derive(Deserialize)]
pub struct UpdatePassword {
    pub current_password: String,
    pub password: String,
}

/// POST /api/user/update-password
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<UpdatePassword>,
) -> ApiResult<Json<bool>> {
    if !auth::verify_password(&input.current_password, &user.password_hash) {
        return Err(ApiError::validation(
            "current_password",
            "Current password is incorrect",
        ));
    }
    auth::update_password(&state.db, user.id, &input.password)?;
    Ok(Json(true))
}

#[derive(Deserialize)]
pub struct SetAvatar {
    pub image_id: i64,
}

/// POST /api/user/avatar
pub async fn set_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<SetAvatar>,
) -> ApiResult<Json<bool>> {
    auth::set_avatar(&state.db, user.id, input.image_id)?;
    Ok(Json(true))
}

/// DELETE /api/user/avatar
pub async fn delete_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<bool>> {
    auth::clear_avatar(&state.db, user.id)?;
    Ok(Json(true))
}
