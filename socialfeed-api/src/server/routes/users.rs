use crate::server::{Result, ServerError, ServerRouter, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use socialfeed_common::model::{
    Id,
    user::{User, UserMarker},
};
use socialfeed_db::client::DbClient;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}
