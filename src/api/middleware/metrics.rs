use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;

/// Label for requests no route matched (scanners, typos).
const UNMATCHED_ROUTE: &str = "unmatched";

/// Route template for the log line, so short codes and ids stay out of labels.
fn route_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let route = route_label(req.extensions().get::<MatchedPath>());

    let response = next.run(req).await;

    let status = response.status();
    let redirect = status.is_redirection() && route == "/:code";

    info!(
        target: "metrics",
        method = %method,
        route = %route,
        status = %status.as_u16(),
        redirect,
        latency_ms = %start.elapsed().as_millis(),
        "request_completed"
    );

    response
}
