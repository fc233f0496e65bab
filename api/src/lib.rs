use axum::{
    Json, Router,
    body::Body,
    extract::{Request, State},
    response::Response,
    routing::{any, get},
};
use factcheck_relay::UploadRelay;
use factcheck_relay_types::HealthResponse;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub const DEFAULT_RELAY_PATH: &str = "/fact-check";

pub fn app(relay: UploadRelay, relay_path: &str) -> Router {
    Router::new()
        .route(relay_path, any(relay_handler))
        .route("/health", get(health_handler))
        .with_state(relay)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Method dispatch, CORS and error mapping are all done by the relay.
pub async fn relay_handler(State(relay): State<UploadRelay>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    relay
        .handle(&parts.method, &parts.headers, body.into_data_stream())
        .await
        .map(Body::from)
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode, header::CONTENT_TYPE};
    use factcheck_relay::{RelayConfig, Url};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const BOUNDARY: &str = "apiBoundary1234";

    fn relay(upstream: &str) -> UploadRelay {
        UploadRelay::new(RelayConfig::new(Url::parse(upstream).unwrap())).unwrap()
    }

    fn request(method: Method, uri: &str, body: Body) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let app = app(relay("http://127.0.0.1:1/hook"), DEFAULT_RELAY_PATH);

        let response = app
            .oneshot(request(Method::GET, "/health", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn preflight_is_answered_without_upstream() {
        let app = app(relay("http://127.0.0.1:1/hook"), DEFAULT_RELAY_PATH);

        let response = app
            .oneshot(request(Method::OPTIONS, "/fact-check", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn get_is_not_allowed() {
        let app = app(relay("http://127.0.0.1:1/hook"), DEFAULT_RELAY_PATH);

        let response = app
            .oneshot(request(Method::GET, "/fact-check", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "method_not_allowed");
    }

    #[tokio::test]
    async fn upload_is_streamed_through_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"verdict": "false"})))
            .expect(1)
            .mount(&server)
            .await;
        let app = app(relay(&format!("{}/hook", server.uri())), "/api/check");

        let multipart = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"pdf\"; filename=\"claim.pdf\"\r\n\r\n\
             %PDF-1.4 claim\r\n\
             --{BOUNDARY}--\r\n"
        );
        let mut upload = request(Method::POST, "/api/check", Body::from(multipart));
        upload.headers_mut().insert(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}")
                .parse()
                .unwrap(),
        );

        let response = app.oneshot(upload).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({"verdict": "false"}));
    }
}
