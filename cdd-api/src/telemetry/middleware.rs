//! Axum middleware recording per-request metrics.
//!
//! Spans and request logs come from `tower_http::trace::TraceLayer`; this
//! layer only feeds `cdd_http_requests_total`.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

use super::metrics::metrics;

/// Label used for requests that matched no route.
const UNMATCHED_PATH: &str = "unmatched";

/// Route template for a request, e.g. `/api/:column_header`.
///
/// Uses the matched route rather than the raw URI so column headers do not
/// become label values.
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = route_label(&request);

    let response = next.run(request).await;

    if let Some(metrics) = metrics() {
        metrics.record_http_request(method.as_str(), &path, response.status().as_u16());
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_route_label_without_match() {
        let request = Request::builder()
            .uri("/api/AGE")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), UNMATCHED_PATH);
    }
}
