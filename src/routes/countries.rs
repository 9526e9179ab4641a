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
    entities::{country, movie_country},
    error::{AppError, AppResult},
    models::NamePayload,
    names::{self, NameKind},
    pagination::ListQuery,
};

async fn find_by_name(db: &DatabaseConnection, name: &str) -> AppResult<Option<country::Model>> {
    Ok(country::Entity::find().filter(country::Column::Name.eq(name)).one(db).await?)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ListQuery>,
) -> AppResult<Json<Value>> {
    let countries =
        country::Entity::find().order_by_asc(country::Column::Name).all(&state.db).await?;
    Ok(Json(listing("countries", countries, &query, |c| &c.name)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<NamePayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let name = names::canonical(NameKind::Country, payload.name.as_deref())?;

    if find_by_name(&state.db, &name).await?.is_some() {
        return Err(AppError::conflict("Country already exists"));
    }

    let country = country::ActiveModel { name: Set(name), ..Default::default() }
        .insert(&state.db)
        .await
        .map_err(AppError::on_unique("Country already exists"))?;

    info!(country_id = country.id, name = %country.name, "country created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Country created successfully",
            "country": country,
        })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
    JsonBody(payload): JsonBody<NamePayload>,
) -> AppResult<Json<Value>> {
    let name = names::canonical(NameKind::Country, payload.name.as_deref())?;

    let country = country::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Country not found"))?;

    if find_by_name(&state.db, &name).await?.is_some_and(|other| other.id != id) {
        return Err(AppError::conflict("Country name already exists"));
    }

    let mut active = country.into_active_model();
    active.name = Set(name);
    let country =
        active.update(&state.db).await.map_err(AppError::on_unique("Country name already exists"))?;

    info!(country_id = id, name = %country.name, "country renamed");
    Ok(Json(json!({
        "success": true,
        "message": "Country updated successfully",
        "country": country,
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
) -> AppResult<Json<Value>> {
    if country::Entity::find_by_id(id).one(&state.db).await?.is_none() {
        return Err(AppError::not_found("Country not found"));
    }

    let txn = state.db.begin().await?;
    movie_country::Entity::delete_many()
        .filter(movie_country::Column::CountryId.eq(id))
        .exec(&txn)
        .await?;
    country::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!(country_id = id, "country deleted");
    Ok(Json(json!({ "success": true, "message": "Country deleted successfully" })))
}
