use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use tracing::warn;

use crate::{
    AppState,
    entities::user::{self, Role},
    error::{AppError, AppResult},
};

/// The signed-in account for the current request, stored in request extensions.
#[derive(Clone, Debug, Serialize)]
pub struct CurrentUser {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
}

impl From<&user::Model> for CurrentUser {
    fn from(user: &user::Model) -> Self {
        Self { id: user.id, email: user.email.clone(), role: user.role, is_verified: user.is_verified }
    }
}

/// Resolves the session cookie, if any. Never rejects; the guards below do that.
pub async fn load_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(super::SESSION_COOKIE) {
        match super::resolve_session(&state.db, cookie.value()).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(CurrentUser::from(&user));
            },
            Ok(None) => {},
            Err(err) => warn!(error = %err, "failed to resolve session"),
        }
    }
    next.run(request).await
}

fn signed_in(request: &Request) -> AppResult<&CurrentUser> {
    request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| AppError::Unauthorized("Unauthorized - no valid session".to_string()))
}

fn authorize(request: &Request, allowed: &[Role]) -> AppResult<()> {
    let user = signed_in(request)?;
    if !user.is_verified {
        return Err(AppError::Forbidden("Email not verified".to_string()));
    }
    if !allowed.contains(&user.role) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    Ok(())
}

pub async fn require_session(request: Request, next: Next) -> AppResult<Response> {
    signed_in(&request)?;
    Ok(next.run(request).await)
}

/// Admin or User.
pub async fn require_member(request: Request, next: Next) -> AppResult<Response> {
    authorize(&request, &[Role::Admin, Role::User])?;
    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> AppResult<Response> {
    authorize(&request, &[Role::Admin])?;
    Ok(next.run(request).await)
}
