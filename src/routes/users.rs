use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde_json::{Value, json};
use tracing::info;

use super::{JsonBody, PathParam};
use crate::{
    AppState,
    auth::CurrentUser,
    entities::{
        review, session,
        user::{self, Role},
    },
    error::{AppError, AppResult},
    models::{RoleRequest, UserView},
};

pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let users: Vec<UserView> = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(UserView::from)
        .collect();
    Ok(Json(json!({ "success": true, "users": users })))
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i32>,
    JsonBody(payload): JsonBody<RoleRequest>,
) -> AppResult<Json<Value>> {
    let role = payload
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| AppError::validation("Role must be Admin or User"))?;

    if id == current.id {
        return Err(AppError::validation("You cannot change your own role"));
    }

    let user = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let mut active = user.into_active_model();
    active.role = Set(role);
    let user = active.update(&state.db).await?;

    info!(user_id = id, role = ?role, "role changed");
    Ok(Json(json!({
        "success": true,
        "message": "User role updated successfully",
        "user": UserView::from(user),
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i32>,
) -> AppResult<Json<Value>> {
    if id == current.id {
        return Err(AppError::validation("You cannot delete your own account"));
    }
    if user::Entity::find_by_id(id).one(&state.db).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let txn = state.db.begin().await?;
    session::Entity::delete_many().filter(session::Column::UserId.eq(id)).exec(&txn).await?;
    review::Entity::delete_many().filter(review::Column::UserId.eq(id)).exec(&txn).await?;
    user::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!(user_id = id, "user deleted");
    Ok(Json(json!({ "success": true, "message": "User deleted successfully" })))
}
