use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde_json::{Value, json};
use tracing::info;

use super::{JsonBody, PathParam, QueryParams, listing};
use crate::{
    AppState,
    entities::{genre, movie_genre},
    error::{AppError, AppResult},
    models::NamePayload,
    names::{self, NameKind},
    pagination::{ListQuery, filter_by_name},
};

async fn find_by_name(db: &DatabaseConnection, name: &str) -> AppResult<Option<genre::Model>> {
    Ok(genre::Entity::find().filter(genre::Column::Name.eq(name)).one(db).await?)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ListQuery>,
) -> AppResult<Json<Value>> {
    let genres =
        genre::Entity::find().order_by_asc(genre::Column::Name).all(&state.db).await?;
    // The plain listing is a bare array; paginated requests get the wrapped shape.
    if query.page.is_none() {
        let genres = filter_by_name(genres, query.search.as_deref(), |g| &g.name);
        return Ok(Json(json!(genres)));
    }
    Ok(Json(listing("genres", genres, &query, |g| &g.name)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<NamePayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let name = names::canonical(NameKind::Genre, payload.name.as_deref())?;

    if find_by_name(&state.db, &name).await?.is_some() {
        return Err(AppError::conflict("Genre already exists"));
    }

    let genre = genre::ActiveModel { name: Set(name), ..Default::default() }
        .insert(&state.db)
        .await
        .map_err(AppError::on_unique("Genre already exists"))?;

    info!(genre_id = genre.id, name = %genre.name, "genre created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Genre created successfully",
            "genre": genre,
        })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
    JsonBody(payload): JsonBody<NamePayload>,
) -> AppResult<Json<Value>> {
    let name = names::canonical(NameKind::Genre, payload.name.as_deref())?;

    let genre = genre::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Genre not found"))?;

    if find_by_name(&state.db, &name).await?.is_some_and(|other| other.id != id) {
        return Err(AppError::conflict("Genre name already exists"));
    }

    let mut active = genre.into_active_model();
    active.name = Set(name);
    let genre =
        active.update(&state.db).await.map_err(AppError::on_unique("Genre name already exists"))?;

    info!(genre_id = id, name = %genre.name, "genre renamed");
    Ok(Json(json!({
        "success": true,
        "message": "Genre updated successfully",
        "genre": genre,
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
) -> AppResult<Json<Value>> {
    if genre::Entity::find_by_id(id).one(&state.db).await?.is_none() {
        return Err(AppError::not_found("Genre not found"));
    }

    let txn = state.db.begin().await?;
    movie_genre::Entity::delete_many()
        .filter(movie_genre::Column::GenreId.eq(id))
        .exec(&txn)
        .await?;
    genre::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!(genre_id = id, "genre deleted");
    Ok(Json(json!({ "success": true, "message": "Genre deleted successfully" })))
}
