use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, LoaderTrait,
    QueryFilter, QueryOrder, Set,
};
use serde_json::{Value, json};
use tracing::info;

use super::{JsonBody, PathParam};
use crate::{
    AppState,
    auth::CurrentUser,
    clock::now_sec,
    entities::{movie, review, user},
    error::{AppError, AppResult},
    models::{ApproveRequest, ReviewRequest, ReviewView},
};

/// Joins reviewer and movie onto each review; emails are only included for the admin listing.
async fn views(
    db: &DatabaseConnection,
    reviews: Vec<review::Model>,
    with_email: bool,
) -> AppResult<Vec<ReviewView>> {
    let users = reviews.load_one(user::Entity, db).await?;
    let movies = reviews.load_one(movie::Entity, db).await?;

    Ok(reviews
        .into_iter()
        .zip(users)
        .zip(movies)
        .map(|((r, user), movie)| ReviewView {
            id: r.id,
            movie_id: r.movie_id,
            movie_title: movie.map(|m| m.title),
            user_id: r.user_id,
            user_name: user.as_ref().map(|u| u.name.clone()),
            user_email: user.filter(|_| with_email).map(|u| u.email),
            rating: r.rating,
            comment: r.comment,
            approved: r.approved,
            created_at: r.created_at,
        })
        .collect())
}

async fn ensure_movie(db: &DatabaseConnection, movie_id: i32) -> AppResult<()> {
    match movie::Entity::find_by_id(movie_id).one(db).await? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Movie not found")),
    }
}

pub async fn list_for_movie(
    State(state): State<Arc<AppState>>,
    PathParam(movie_id): PathParam<i32>,
) -> AppResult<Json<Value>> {
    ensure_movie(&state.db, movie_id).await?;

    let reviews = review::Entity::find()
        .filter(review::Column::MovieId.eq(movie_id))
        .filter(review::Column::Approved.eq(true))
        .order_by_desc(review::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(json!({ "success": true, "reviews": views(&state.db, reviews, false).await? })))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    PathParam(movie_id): PathParam<i32>,
    JsonBody(payload): JsonBody<ReviewRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    ensure_movie(&state.db, movie_id).await?;

    let rating = payload
        .rating
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::validation("Rating must be between 1 and 5"))?;
    let comment = payload
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::validation("Comment is required"))?;

    let review = review::ActiveModel {
        movie_id: Set(movie_id),
        user_id: Set(current.id),
        rating: Set(rating),
        comment: Set(comment),
        approved: Set(false),
        created_at: Set(now_sec()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!(review_id = review.id, movie_id, user_id = current.id, "review submitted");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Review submitted for approval",
            "review": review,
        })),
    ))
}

pub async fn list_all(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let reviews = review::Entity::find().order_by_desc(review::Column::Id).all(&state.db).await?;
    Ok(Json(json!({ "success": true, "reviews": views(&state.db, reviews, true).await? })))
}

pub async fn approve(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
    JsonBody(payload): JsonBody<ApproveRequest>,
) -> AppResult<Json<Value>> {
    let review = review::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Review not found"))?;

    let mut active = review.into_active_model();
    active.approved = Set(payload.approved);
    let review = active.update(&state.db).await?;

    info!(review_id = id, approved = review.approved, "review moderated");
    Ok(Json(json!({ "success": true, "message": "Review updated successfully", "review": review })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
) -> AppResult<Json<Value>> {
    let result = review::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Review not found"));
    }
    info!(review_id = id, "review deleted");
    Ok(Json(json!({ "success": true, "message": "Review deleted successfully" })))
}
