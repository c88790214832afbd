use crate::server::{ServerError, ServerRouter, json::Json};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(health)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/health", rejection(ServerError))]
struct HealthPath();

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health(HealthPath(): HealthPath) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
