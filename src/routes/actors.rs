use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde_json::{Value, json};
use tracing::info;

use super::{PathParam, QueryParams, listing};
use crate::{
    AppState,
    entities::{actor, movie_actor},
    error::{AppError, AppResult},
    pagination::ListQuery,
    upload::{self, FormFields, ImageFile, UploadKind},
};

const PHOTO_FIELD: &str = "profile_path";

fn check_photo(file: &ImageFile) -> AppResult<()> {
    if !file.is_image() {
        return Err(AppError::validation("Only image files are allowed for the profile picture."));
    }
    Ok(())
}

/// A text profile picture must be an external link; upload paths only come from stored files.
fn check_photo_url(url: &str) -> AppResult<()> {
    if upload::is_local(url) {
        return Err(AppError::validation(
            "Profile picture must be an uploaded image or an external link.",
        ));
    }
    Ok(())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ListQuery>,
) -> AppResult<Json<Value>> {
    let mut select = actor::Entity::find().order_by_asc(actor::Column::Name);
    if let Some(limit) = query.limit {
        select = select.limit(limit);
    }
    let actors = select.all(&state.db).await?;

    let mut body = listing("actors", actors, &query, |a| &a.name);
    body["success"] = json!(true);
    Ok(Json(body))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    mut fields: FormFields,
) -> AppResult<(StatusCode, Json<Value>)> {
    let name = fields.text("name");
    let photo = fields.take_file(PHOTO_FIELD);
    let url = fields.text(PHOTO_FIELD);

    let missing = || AppError::validation("Please provide both a name and a profile picture.");
    let name = name.ok_or_else(missing)?;

    let profile_path = match (&photo, url) {
        (Some(file), _) => {
            check_photo(file)?;
            state.uploads.save(UploadKind::ActorPhoto, file).await?
        },
        (None, Some(url)) => {
            check_photo_url(&url)?;
            url
        },
        (None, None) => return Err(missing()),
    };

    let inserted = actor::ActiveModel {
        name: Set(name),
        profile_path: Set(profile_path.clone()),
        ..Default::default()
    }
    .insert(&state.db)
    .await;

    let actor = match inserted {
        Ok(actor) => actor,
        Err(err) => {
            if photo.is_some() {
                state.uploads.remove(UploadKind::ActorPhoto, &profile_path).await;
            }
            return Err(err.into());
        },
    };

    info!(actor_id = actor.id, name = %actor.name, "actor created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Actor created successfully", "actor": actor })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
    mut fields: FormFields,
) -> AppResult<Json<Value>> {
    let name = fields.text("name").ok_or_else(|| AppError::validation("Actor name is required"))?;
    let photo = fields.take_file(PHOTO_FIELD);
    if let Some(file) = &photo {
        check_photo(file)?;
    }

    let existing = actor::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Actor not found"))?;
    let old_path = existing.profile_path.clone();

    let new_path = match &photo {
        Some(file) => state.uploads.save(UploadKind::ActorPhoto, file).await?,
        None => match fields.text(PHOTO_FIELD) {
            // Re-submitting the current value keeps it, even when it is an upload path.
            Some(url) if url != old_path => {
                check_photo_url(&url)?;
                url
            },
            _ => old_path.clone(),
        },
    };

    let mut active = existing.into_active_model();
    active.name = Set(name);
    active.profile_path = Set(new_path.clone());
    let actor = match active.update(&state.db).await {
        Ok(actor) => actor,
        Err(err) => {
            if photo.is_some() {
                state.uploads.remove(UploadKind::ActorPhoto, &new_path).await;
            }
            return Err(err.into());
        },
    };

    if new_path != old_path {
        state.uploads.remove(UploadKind::ActorPhoto, &old_path).await;
    }

    info!(actor_id = id, "actor updated");
    Ok(Json(json!({ "success": true, "message": "Actor updated successfully", "actor": actor })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
) -> AppResult<Json<Value>> {
    let actor = actor::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Actor not found"))?;

    let txn = state.db.begin().await?;
    movie_actor::Entity::delete_many().filter(movie_actor::Column::ActorId.eq(id)).exec(&txn).await?;
    actor::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    state.uploads.remove(UploadKind::ActorPhoto, &actor.profile_path).await;

    info!(actor_id = id, "actor deleted");
    Ok(Json(json!({ "success": true, "message": "Actor deleted successfully" })))
}
