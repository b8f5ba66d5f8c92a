use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

/// How loudly a finished request is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Health checks and static files that went fine.
    Quiet,
    Ok,
    ClientError,
    ServerError,
}

/// Successful requests to these paths are only traced.
fn is_noisy_path(path: &str) -> bool {
    path.starts_with("/health") || path.starts_with("/media/") || path.starts_with("/static/")
}

pub fn classify(path: &str, status: StatusCode) -> Outcome {
    if status.is_server_error() {
        Outcome::ServerError
    } else if status.is_client_error() {
        Outcome::ClientError
    } else if is_noisy_path(path) {
        Outcome::Quiet
    } else {
        Outcome::Ok
    }
}

pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();

    let req_id = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    match classify(&path, status) {
        Outcome::Quiet => tracing::trace!(
            request_id = %req_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "request served"
        ),
        Outcome::Ok => tracing::info!(
            request_id = %req_id,
            method = %method,
            host = %host,
            path = %path,
            query = %query,
            status = status.as_u16(),
            duration_ms,
            "request served"
        ),
        Outcome::ClientError => tracing::warn!(
            request_id = %req_id,
            method = %method,
            host = %host,
            path = %path,
            query = %query,
            status = status.as_u16(),
            duration_ms,
            "request rejected"
        ),
        Outcome::ServerError => tracing::error!(
            request_id = %req_id,
            method = %method,
            host = %host,
            path = %path,
            query = %query,
            status = status.as_u16(),
            duration_ms,
            "request failed"
        ),
    }

    response
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/v2/pages/", get(|| async { "ok" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(propagate_request_id_layer())
            .layer(axum::middleware::from_fn(log_request))
            .layer(request_id_layer())
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("/health/live", StatusCode::OK), Outcome::Quiet);
        assert_eq!(classify("/media/images/a.png", StatusCode::OK), Outcome::Quiet);
        assert_eq!(classify("/api/v2/pages/", StatusCode::OK), Outcome::Ok);
        assert_eq!(classify("/health/ready", StatusCode::SERVICE_UNAVAILABLE), Outcome::ServerError);
        assert_eq!(classify("/api/v2/pages/9/", StatusCode::NOT_FOUND), Outcome::ClientError);
    }

    #[tokio::test]
    async fn test_request_id_is_generated_and_propagated() {
        let res = test_router()
            .oneshot(Request::get("/api/v2/pages/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_kept() {
        let req = Request::get("/missing")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["x-request-id"], "abc-123");
    }
}
