use axum::{routing::get, Router};

/// Liveness probe; does not touch the model or the database
async fn status() -> &'static str {
    "ok"
}

pub fn routes() -> Router {
    Router::new().route("/status", get(status))
}
