use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use sea_orm::EntityTrait;
use serde_json::{Value, json};
use tracing::debug;

use super::{ClientIp, JsonBody, PathParam};
use crate::{
    AppState,
    auth::{self, CurrentUser, SESSION_COOKIE, Signup, mailer::Mail},
    entities::user,
    error::{AppError, AppResult},
    models::{
        ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest, UserView,
        VerifyEmailRequest,
    },
};

const LIMITER_PRUNE_AT: usize = 10_000;

fn throttle(state: &AppState, ClientIp(ip): ClientIp) -> AppResult<()> {
    let limiter = &state.auth_limiter;
    if limiter.len() > LIMITER_PRUNE_AT {
        limiter.retain_recent();
    }
    limiter.check_key(&ip).map_err(|_| {
        debug!(client = %ip, "auth attempt throttled");
        AppError::RateLimited
    })
}

fn session_cookie(token: String, ttl_days: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(ttl_days))
        .build()
}

async fn sign_in(state: &AppState, jar: CookieJar, user_id: i32) -> AppResult<CookieJar> {
    let ttl = state.config.session_ttl_days;
    let session = auth::open_session(&state.db, user_id, ttl).await?;
    Ok(jar.add(session_cookie(session.token, ttl)))
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    client: ClientIp,
    jar: CookieJar,
    JsonBody(req): JsonBody<SignupRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<Value>)> {
    throttle(&state, client)?;

    let (user, code) =
        auth::register(&state.db, Signup { email: req.email, password: req.password, name: req.name })
            .await?;
    state.mailer.send(&user.email, Mail::Verification { code });

    let jar = sign_in(&state, jar, user.id).await?;
    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "user": UserView::from(user),
        })),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientIp,
    jar: CookieJar,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<(CookieJar, Json<Value>)> {
    throttle(&state, client)?;

    let user = auth::authenticate(&state.db, &req.email, &req.password).await?;
    let jar = sign_in(&state, jar, user.id).await?;
    Ok((
        jar,
        Json(json!({
            "success": true,
            "message": "Logged in successfully",
            "user": UserView::from(user),
        })),
    ))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<Value>)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        auth::close_session(&state.db, cookie.value()).await?;
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Json(json!({ "success": true, "message": "Logged out successfully" }))))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<VerifyEmailRequest>,
) -> AppResult<Json<Value>> {
    let user = auth::verify_email(&state.db, &req.code).await?;
    state.mailer.send(&user.email, Mail::Welcome { name: user.name.clone() });
    Ok(Json(json!({
        "success": true,
        "message": "Email verified successfully",
        "user": UserView::from(user),
    })))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    client: ClientIp,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> AppResult<Json<Value>> {
    throttle(&state, client)?;

    let (user, token) = auth::start_password_reset(&state.db, &req.email).await?;
    let url = format!("{}/reset-password/{token}", state.config.client_url.trim_end_matches('/'));
    state.mailer.send(&user.email, Mail::PasswordReset { url });

    Ok(Json(json!({ "success": true, "message": "Password reset link sent to your email" })))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    PathParam(token): PathParam<String>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> AppResult<Json<Value>> {
    let user = auth::reset_password(&state.db, &token, &req.password).await?;
    state.mailer.send(&user.email, Mail::ResetSuccess);
    Ok(Json(json!({ "success": true, "message": "Password reset successful" })))
}

pub async fn check_auth(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<Value>> {
    let user = user::Entity::find_by_id(current.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
    Ok(Json(json!({ "success": true, "user": UserView::from(user) })))
}
