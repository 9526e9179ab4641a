mod actors;
mod auth;
mod countries;
mod genres;
mod movies;
mod reviews;
mod users;

use std::{
    convert::Infallible,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    Json, Router,
    extract::{
        ConnectInfo, DefaultBodyLimit, FromRequest, FromRequestParts, Path, Query, Request,
        rejection::JsonRejection,
    },
    http::{HeaderValue, Method, header, request::Parts},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::{
    AppState,
    auth::middleware::{load_session, require_admin, require_member, require_session},
    config::Config,
    error::AppError,
    pagination::{ListQuery, filter_by_name, paginate},
};

pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password/{token}", post(auth::reset_password))
        .route("/countries", get(countries::list))
        .route("/genres", get(genres::list))
        .route("/actors", get(actors::list))
        .route("/movies", get(movies::list))
        .route("/movies/search", get(movies::search))
        .route("/movies/{id}", get(movies::show))
        .route("/movies/{id}/reviews", get(reviews::list_for_movie));

    let session = Router::new()
        .route("/auth/check-auth", get(auth::check_auth))
        .route_layer(from_fn(require_session));

    let member = Router::new()
        .route("/movies", post(movies::create))
        .route("/movies/{id}/reviews", post(reviews::create))
        .route_layer(from_fn(require_member));

    let admin = Router::new()
        .route("/countries", post(countries::create))
        .route("/countries/{id}", put(countries::update).delete(countries::delete))
        .route("/genres", post(genres::create))
        .route("/genres/{id}", put(genres::update).delete(genres::delete))
        .route("/actors", post(actors::create))
        .route("/actors/{id}", put(actors::update).delete(actors::delete))
        .route("/movies/{id}", put(movies::update).delete(movies::delete))
        .route("/reviews", get(reviews::list_all))
        .route("/reviews/{id}", delete(reviews::delete))
        .route("/reviews/{id}/approve", put(reviews::approve))
        .route("/users", get(users::list))
        .route("/users/{id}", delete(users::delete))
        .route("/users/{id}/role", put(users::update_role))
        .route_layer(from_fn(require_admin));

    let api = public
        .merge(session)
        .merge(member)
        .merge(admin)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(from_fn_with_state(state.clone(), load_session));

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(state.uploads.root()))
        .with_state(state)
}

/// Credentialed CORS for the configured console origin, or a permissive policy without one.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let origin = config.cors_origin.as_deref().and_then(|o| HeaderValue::from_str(o).ok());
    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]),
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    }
}

/// `Json` whose rejections use the API's error body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) =
            Json::<T>::from_request(req, state).await.map_err(|e| AppError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `Path` whose rejections use the API's error body.
pub struct PathParam<T>(pub T);

impl<S, T> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query` whose rejections use the API's error body.
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Peer address of the connection. Falls back to the unspecified address when the server was
/// not started with connect info, so every such request shares one rate-limit bucket.
pub struct ClientIp(pub IpAddr);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        Ok(Self(ip))
    }
}

/// `{key: items}`, filtered by `search` and, when `page` is given, paginated.
fn listing<T: Serialize>(
    key: &str,
    items: Vec<T>,
    query: &ListQuery,
    name: impl Fn(&T) -> &str,
) -> Value {
    let items = filter_by_name(items, query.search.as_deref(), name);
    match query.page {
        Some(page) => {
            let (items, meta) = paginate(items, page);
            json!({ key: items, "pagination": meta })
        },
        None => json!({ key: items }),
    }
}
