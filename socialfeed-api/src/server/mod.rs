use axum::{
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use serde::{Deserialize, Serialize};
use socialfeed_common::model::{
    Id, feed::InvalidFeedQueryError, post::PostMarker, user::UserMarker,
};
use socialfeed_db::client::{DbClient, DbError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

mod auth;
mod json;
mod query;
mod routes;

pub type ServerRouter = axum::Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("X-User-Id header was missing or invalid: {0}")]
    InvalidPrincipalHeader(TypedHeaderRejection),
    #[error("Invalid feed query: {0}")]
    InvalidFeedQuery(#[from] InvalidFeedQueryError),
    #[error("User {user_id} may not modify post {post_id}")]
    NotPostAuthor {
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    },
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::UserByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Database(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            ServerError::InvalidPrincipalHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::NotPostAuthor { .. } => StatusCode::FORBIDDEN,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidPrincipalHeader(_)
            | ServerError::InvalidFeedQuery(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_) | ServerError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage failures stay in the log.
        let message = if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_owned()
        } else {
            warn!(error = %self, %status, "Replying with error");
            self.to_string()
        };

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message,
        };
        (status, Json(error_response)).into_response()
    }
}
