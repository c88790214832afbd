use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

/// JSON body whose rejections and serialization failures surface as
/// [`ServerError`].
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// A freshly created resource, answered with `201 Created`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::json::{Created, Json};
    use axum::{
        http::{StatusCode, header::CONTENT_TYPE},
        response::IntoResponse,
    };
    use std::collections::BTreeMap;

    #[test]
    fn json_sets_content_type() {
        let response = Json(BTreeMap::from([("status", "ok")])).into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn created_is_201() {
        let response = Created(BTreeMap::from([("id", 1)])).into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn unserializable_body_is_500() {
        // JSON object keys must be strings.
        let response = Json(BTreeMap::from([((1, 2), "pair")])).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
