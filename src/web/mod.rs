//! HTTP routes: the JSON API over [`ComicService`] and the static artifact directory.

use std::num::NonZeroU16;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::service::ComicService;

mod prelude;
mod views;

use views::{
    generate_cover_handler, generate_image_handler, generate_script_handler, health_handler,
    proxy_image_handler, validate_handler,
};

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    service: Arc<ComicService>,
}

impl AppState {
    fn new(service: ComicService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

fn create_router(state: AppState) -> Router {
    let artifacts = ServeDir::new(state.service.store().root());
    let prefix = state.service.store().url_prefix().to_string();
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/generate", post(generate_script_handler))
        .route("/api/validate", post(validate_handler))
        .route("/api/generate-image", post(generate_image_handler))
        .route("/api/generate-cover", post(generate_cover_handler))
        .route("/api/proxy-image", get(proxy_image_handler))
        .nest_service(&prefix, artifacts)
        .with_state(state)
}

/// Binds `listen_addr:port` and serves the API until the process stops.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    service: ComicService,
) -> Result<(), anyhow::Error> {
    info!("Artifacts live in {}", service.store().root().display());
    let app = create_router(AppState::new(service));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
    use http_body_util::BodyExt;
    use httpmock::MockServer;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::ServiceConfig;
    use crate::generation::{ModelResponse, RetryPolicy};
    use crate::references::tests::png_bytes;

    fn setup_app(gemini_base: &str, dir: &std::path::Path) -> Router {
        let config = ServiceConfig {
            artifact_dir: dir.to_path_buf(),
            gemini_api_base: gemini_base.to_string(),
            retry: RetryPolicy::new(2, 0.0),
            ..ServiceConfig::default()
        };
        create_router(AppState::new(ComicService::new(
            reqwest::Client::new(),
            config,
        )))
    }

    async fn read_body(response: axum::response::Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
            .to_vec()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        serde_json::from_slice(&read_body(response).await).expect("json body")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request")
    }

    fn page_data() -> Value {
        json!({"title": "T", "rows": [{"height": "250px", "panels": [{"text": "hero jumps"}]}]})
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let app = setup_app("http://127.0.0.1:9", tmp.path());
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .expect("build request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn validate_reports_shape_problems() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let app = setup_app("http://127.0.0.1:9", tmp.path());

        let response = app
            .clone()
            .oneshot(post_json("/api/validate", json!({"script": [page_data()]})))
            .await
            .expect("response");
        assert_eq!(read_json(response).await, json!({"valid": true}));

        let response = app
            .oneshot(post_json("/api/validate", json!({"script": {"title": "x"}})))
            .await
            .expect("response");
        assert_eq!(
            read_json(response).await,
            json!({"valid": false, "error": "Invalid page structure"})
        );
    }

    #[tokio::test]
    async fn generate_image_requires_page_data() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let app = setup_app("http://127.0.0.1:9", tmp.path());

        let response = app
            .clone()
            .oneshot(post_json("/api/generate-image", json!({"google_api_key": "k"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({"error": "Page data is required"})
        );

        let request = Request::builder()
            .method("POST")
            .uri("/api/generate-image")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("not json"))
            .expect("build request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({"error": "No JSON data provided"})
        );
    }

    #[tokio::test]
    async fn generate_image_without_key_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let app = setup_app("http://127.0.0.1:9", tmp.path());
        let response = app
            .oneshot(post_json(
                "/api/generate-image",
                json!({"page_data": page_data()}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({"error": "Google API key is required"})
        );
    }

    #[tokio::test]
    async fn generated_page_is_served_from_artifact_url() {
        let server = MockServer::start_async().await;
        let image = png_bytes(9, 16);
        let body = serde_json::to_value(ModelResponse::with_image("image/png", &image))
            .expect("serialize");
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/v1beta/models/gemini-3-pro-image-preview:generateContent");
                then.status(200).json_body(body);
            })
            .await;
        let tmp = tempfile::tempdir().expect("tempdir");
        let app = setup_app(&server.url("/v1beta"), tmp.path());

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/generate-image",
                json!({
                    "page_data": page_data(),
                    "comic_style": "ghibli",
                    "google_api_key": "test-key",
                }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
        let json = read_json(response).await;
        assert_eq!(json["success"], json!(true));
        assert!(
            json["prompt"]
                .as_str()
                .is_some_and(|prompt| prompt.contains("Panel 1-1: hero jumps"))
        );
        let image_url = json["image_url"].as_str().expect("image_url").to_string();
        assert!(image_url.starts_with("/backend/static/images/"));

        let request = Request::builder()
            .uri(&image_url)
            .body(Body::empty())
            .expect("build request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let served = read_body(response).await;
        let decoded = image::load_from_memory(&served).expect("decode served png");
        assert_eq!((decoded.width(), decoded.height()), (9, 16));
    }

    #[tokio::test]
    async fn failed_generation_returns_server_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200)
                    .json_body(json!({"candidates": [{"finishReason": "SAFETY"}]}));
            })
            .await;
        let tmp = tempfile::tempdir().expect("tempdir");
        let app = setup_app(&server.url("/v1beta"), tmp.path());

        let response = app
            .oneshot(post_json(
                "/api/generate-cover",
                json!({"comic_style": "pixar", "google_api_key": "k"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mock.hits_async().await, 2);
        let json = read_json(response).await;
        assert!(
            json["error"]
                .as_str()
                .is_some_and(|message| message.contains("SAFETY"))
        );
        assert_eq!(std::fs::read_dir(tmp.path()).expect("list").count(), 0);
    }

    #[tokio::test]
    async fn cover_accepts_a_single_reference() {
        let server = MockServer::start_async().await;
        let body = serde_json::to_value(ModelResponse::with_image("image/png", &png_bytes(9, 16)))
            .expect("serialize");
        let mock = server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200).json_body(body);
            })
            .await;
        let tmp = tempfile::tempdir().expect("tempdir");
        let app = setup_app(&server.url("/v1beta"), tmp.path());

        for reference in [
            json!("/backend/static/images/missing.png"),
            json!({"imageUrl": "/backend/static/images/missing.png"}),
        ] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/generate-cover",
                    json!({
                        "comic_style": "disney",
                        "google_api_key": "k",
                        "reference_imgs": reference,
                    }),
                ))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(read_json(response).await["success"], json!(true));
        }
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn proxy_requires_url_and_sets_download_headers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/pic.jpg");
                then.status(200)
                    .header("content-type", "image/jpeg")
                    .body(b"jpegbytes");
            })
            .await;
        let tmp = tempfile::tempdir().expect("tempdir");
        let app = setup_app("http://127.0.0.1:9", tmp.path());

        let request = Request::builder()
            .uri("/api/proxy-image")
            .body(Body::empty())
            .expect("build request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .uri(format!("/api/proxy-image?url={}", server.url("/pic.jpg")))
            .body(Body::empty())
            .expect("build request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[CONTENT_TYPE], "image/jpeg");
        assert_eq!(headers["access-control-allow-origin"], "*");
        let disposition = headers["content-disposition"].to_str().expect("ascii");
        assert!(disposition.starts_with("attachment; filename=comic-"));
        assert_eq!(read_body(response).await, b"jpegbytes".to_vec());
    }
}
