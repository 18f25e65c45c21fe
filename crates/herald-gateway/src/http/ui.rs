use axum::{http::header, response::IntoResponse};

static DEMO_PAGE: &str = include_str!("../../static/index.html");

/// GET /: embedded EventSource demo client.
pub async fn ui_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        DEMO_PAGE,
    )
}
