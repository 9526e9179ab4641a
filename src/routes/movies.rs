use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde_json::{Value, json};

use super::{PathParam, QueryParams};

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{MovieForm, SearchQuery},
    movies::{self, MovieChanges, MovieFields, NewMovie},
    upload::{FormFields, UploadKind},
};

pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let movies = movies::latest(&state.db, movies::LATEST_LIMIT)
        .await
        .map_err(AppError::server("Failed to retrieve movies"))?;
    Ok(Json(json!({ "success": true, "movies": movies })))
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
) -> AppResult<Json<Value>> {
    let movie = movies::find(&state.db, id)
        .await
        .map_err(AppError::server("Failed to retrieve movie"))?
        .ok_or_else(|| AppError::not_found("Movie not found"))?;
    Ok(Json(json!({ "success": true, "movie": movie })))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> AppResult<Json<Value>> {
    let q = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::validation("Search query is required"))?;

    let movies = movies::search(&state.db, q, movies::LATEST_LIMIT)
        .await
        .map_err(AppError::server("Failed to search movies"))?;
    Ok(Json(json!({ "success": true, "movies": movies })))
}

fn fields_of(form: &mut MovieForm, title: String) -> MovieFields {
    MovieFields {
        title,
        synopsis: form.synopsis.take(),
        year: form.year,
        rating: form.rating,
        trailer: form.trailer.take(),
        category: form.category.take(),
    }
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    fields: FormFields,
) -> AppResult<(StatusCode, Json<Value>)> {
    let mut form = MovieForm::from_fields(fields)?;
    form.check_poster_type()?;

    let (Some(title), Some(poster)) = (form.title.take(), form.poster.take()) else {
        return Err(AppError::validation("Both title and poster are required."));
    };

    let poster_path = state.uploads.save(UploadKind::Poster, &poster).await?;

    let new = NewMovie {
        fields: fields_of(&mut form, title),
        poster: poster_path.clone(),
        genres: form.genres.unwrap_or_default(),
        actors: form.actors.unwrap_or_default(),
        countries: form.countries.unwrap_or_default(),
    };

    let movie = match movies::create(&state.db, new).await {
        Ok(movie) => movie,
        Err(err) => {
            state.uploads.remove(UploadKind::Poster, &poster_path).await;
            return Err(AppError::server("Failed to create movie")(err));
        },
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Movie created successfully", "movie": movie })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
    fields: FormFields,
) -> AppResult<Json<Value>> {
    let mut form = MovieForm::from_fields(fields)?;
    form.check_poster_type()?;

    let title = form.title.take().ok_or_else(|| AppError::validation("Title is required"))?;

    let new_poster = match form.poster.take() {
        Some(file) => Some(state.uploads.save(UploadKind::Poster, &file).await?),
        None => None,
    };

    let changes = MovieChanges {
        fields: fields_of(&mut form, title),
        poster: new_poster.clone(),
        genres: form.genres.take(),
        actors: form.actors.take(),
        countries: form.countries.take(),
    };

    let updated = match movies::update(&state.db, id, changes).await {
        Ok(Some(updated)) => updated,
        other => {
            if let Some(path) = &new_poster {
                state.uploads.remove(UploadKind::Poster, path).await;
            }
            return Err(match other {
                Ok(_) => AppError::not_found("Movie not found"),
                Err(err) => AppError::server("Failed to update movie")(err),
            });
        },
    };

    if let Some(old) = &updated.replaced_poster {
        state.uploads.remove(UploadKind::Poster, old).await;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Movie updated successfully",
        "movie": updated.movie,
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i32>,
) -> AppResult<Json<Value>> {
    let movie = movies::delete(&state.db, id)
        .await
        .map_err(AppError::server("Failed to delete movie"))?
        .ok_or_else(|| AppError::not_found("Movie not found"))?;

    // Row is gone; a leftover file is only logged.
    state.uploads.remove(UploadKind::Poster, &movie.poster).await;

    Ok(Json(json!({
        "success": true,
        "message": "Movie and associated relationships deleted successfully",
    })))
}
