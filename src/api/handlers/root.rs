use axum::response::{IntoResponse, Json};
use serde_json::json;

// axum handler for `/`, not part of the OpenAPI document
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to the saaskit API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/docs",
        "health": "/health",
    }))
}
