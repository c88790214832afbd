use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json, query::Query,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use socialfeed_common::model::{
    feed::{FeedQuery, FeedQueryParams},
    post::PostWithMetadata,
};
use socialfeed_db::client::DbClient;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_user_feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/feed", rejection(ServerError))]
struct UserFeedPath();

async fn get_user_feed(
    UserFeedPath(): UserFeedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(params): Query<FeedQueryParams>,
) -> Result<Json<Vec<PostWithMetadata>>> {
    let feed_query = FeedQuery::try_from(params)?;
    debug!(user_id = %user.user_id(), ?feed_query, "Fetching feed");

    let feed = db.fetch_user_feed(user.user_id(), &feed_query).await?;

    Ok(Json(feed))
}
