use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use socialfeed_common::model::{
    Id,
    comment::{Comment, NewComment},
    post::{NewPost, Post, PostMarker, PostPatch},
};
use socialfeed_db::client::DbClient;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_patch(update_post)
        .typed_delete(delete_post)
        .typed_post(create_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

/// Fetches a post `user` is about to modify.
async fn load_own_post(db: &DbClient, id: Id<PostMarker>, user: AuthenticatedUser) -> Result<Post> {
    let post = db.fetch_post(id).await?;

    if post.author_id != user.user_id() {
        return Err(ServerError::NotPostAuthor {
            user_id: user.user_id(),
            post_id: id,
        });
    }

    Ok(post)
}

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<NewPost>,
) -> Result<Created<Post>> {
    let post = db.create_post(user.user_id(), &post).await?;

    Ok(Created(post))
}

async fn get_post(PostPath { id }: PostPath, State(db): State<Arc<DbClient>>) -> Result<Json<Post>> {
    let mut post = db.fetch_post(id).await?;
    post.comments = db.fetch_post_comments(id).await?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>> {
    let mut post = load_own_post(&db, id, user).await?;
    post.apply(patch);

    post.version = db.update_post(&post).await?;
    debug!(post_id = %id, version = post.version.get(), "Updated post");

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    load_own_post(&db, id, user).await?;
    db.delete_post(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn create_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(comment): Json<NewComment>,
) -> Result<Created<Comment>> {
    let comment = db
        .create_comment(id, user.user_id(), &comment.content)
        .await?;

    Ok(Created(comment))
}
