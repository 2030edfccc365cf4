use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::gateway::ConversionGateway;

pub struct AppState {
    pub gateway: ConversionGateway,
    pub audio_dir: PathBuf,
    pub views_dir: PathBuf,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(handlers::index))
        .route("/convert", post(handlers::convert))
        .route("/list", get(handlers::list_audio))
        .route("/health", get(handlers::health))
        .route("/audio/:name", get(handlers::audio_file))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::{CONVERSION_STATUS_HEADER, CONVERT_ACK};
    use crate::error::AppError;
    use crate::gateway::OUTPUT_FILE_NAME;
    use crate::synth::Synthesizer;
    use crate::templates::{INDEX_VIEW, LIST_VIEW};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use base64::{engine::general_purpose, Engine as _};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct CannedSynth(String);

    #[async_trait]
    impl Synthesizer for CannedSynth {
        async fn synthesize(&self, _: &str, _: &str) -> Result<Vec<u8>, AppError> {
            Ok(self.0.clone().into_bytes())
        }
    }

    /// Takes a while to answer, like a real synthesizer.
    struct SlowSynth(String, Duration);

    #[async_trait]
    impl Synthesizer for SlowSynth {
        async fn synthesize(&self, _: &str, _: &str) -> Result<Vec<u8>, AppError> {
            tokio::time::sleep(self.1).await;
            Ok(self.0.clone().into_bytes())
        }
    }

    struct Fixture {
        audio: TempDir,
        views: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let views = TempDir::new().unwrap();
            std::fs::write(views.path().join(INDEX_VIEW), "<h1>Text to audio</h1>").unwrap();
            std::fs::write(
                views.path().join(LIST_VIEW),
                "<html><ul>{{audioList}}</ul></html>",
            )
            .unwrap();
            Self {
                audio: TempDir::new().unwrap(),
                views,
            }
        }

        fn app(&self, envelope: &str) -> Router {
            self.app_with_dirs(envelope, self.audio.path().into(), self.views.path().into())
        }

        fn app_with_dirs(&self, envelope: &str, audio_dir: PathBuf, views_dir: PathBuf) -> Router {
            app_with_synth(Arc::new(CannedSynth(envelope.to_string())), audio_dir, views_dir)
        }
    }

    fn app_with_synth(
        synth: Arc<dyn Synthesizer>,
        audio_dir: PathBuf,
        views_dir: PathBuf,
    ) -> Router {
        let gateway = ConversionGateway::new(synth, audio_dir.join(OUTPUT_FILE_NAME));
        create_router(Arc::new(AppState {
            gateway,
            audio_dir,
            views_dir,
        }))
    }

    fn good_envelope(audio: &[u8]) -> String {
        serde_json::json!({ "success": true, "text": general_purpose::STANDARD.encode(audio) })
            .to_string()
    }

    fn json_convert(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/convert")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_convert_acknowledges_and_writes_audio() {
        let fx = Fixture::new();
        let app = fx.app(&good_envelope(b"RIFFdata"));

        let response = app
            .oneshot(json_convert(serde_json::json!({
                "conversation": "[]",
                "speaker_data": "{}"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&CONVERSION_STATUS_HEADER], "ok");
        assert_eq!(body_string(response).await, CONVERT_ACK);
        assert_eq!(
            std::fs::read(fx.audio.path().join(OUTPUT_FILE_NAME)).unwrap(),
            b"RIFFdata"
        );
    }

    #[tokio::test]
    async fn test_convert_degraded_still_acknowledges() {
        let fx = Fixture::new();
        let app = fx.app(r#"{"success": true}"#);

        let response = app
            .oneshot(json_convert(serde_json::json!({
                "conversation": "[]",
                "speaker_data": "{}"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&CONVERSION_STATUS_HEADER], "degraded");
        assert_eq!(body_string(response).await, "data sent");
        assert!(!fx.audio.path().join(OUTPUT_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_convert_accepts_form_body() {
        let fx = Fixture::new();
        let app = fx.app(&good_envelope(b"form"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/convert")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("conversation=%5B%5D&speaker_data=%7B%7D"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, CONVERT_ACK);
        assert_eq!(
            std::fs::read(fx.audio.path().join(OUTPUT_FILE_NAME)).unwrap(),
            b"form"
        );
    }

    #[tokio::test]
    async fn test_convert_missing_field_is_bad_request() {
        let fx = Fixture::new();
        let app = fx.app(&good_envelope(b"x"));

        let response = app
            .oneshot(json_convert(serde_json::json!({ "conversation": "[]" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!fx.audio.path().join(OUTPUT_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_convert_malformed_json_is_bad_request() {
        let fx = Fixture::new();
        let app = fx.app(&good_envelope(b"x"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/convert")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_shows_only_audio_files() {
        let fx = Fixture::new();
        for name in ["a.mp3", "b.txt", "c.wav"] {
            std::fs::write(fx.audio.path().join(name), b"x").unwrap();
        }
        let app = fx.app(&good_envelope(b"x"));

        let response = app.oneshot(get_request("/list")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        let html = body_string(response).await;
        assert_eq!(html.matches("<li>").count(), 2);
        assert!(html.contains("<li>a.mp3</li>"));
        assert!(html.contains("<li>c.wav</li>"));
        assert!(!html.contains("b.txt"));
    }

    #[tokio::test]
    async fn test_list_unreadable_directory_is_500() {
        let fx = Fixture::new();
        let missing = fx.audio.path().join("gone");
        let app = fx.app_with_dirs(&good_envelope(b"x"), missing, fx.views.path().into());

        let response = app.oneshot(get_request("/list")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["code"], "DIRECTORY_UNREADABLE");
    }

    #[tokio::test]
    async fn test_list_missing_template_is_500() {
        let fx = Fixture::new();
        let empty_views = TempDir::new().unwrap();
        let app = fx.app_with_dirs(
            &good_envelope(b"x"),
            fx.audio.path().into(),
            empty_views.path().into(),
        );

        let response = app.oneshot(get_request("/list")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["code"], "TEMPLATE_LOAD_FAILURE");
    }

    #[tokio::test]
    async fn test_index_renders_view() {
        let fx = Fixture::new();
        let app = fx.app(&good_envelope(b"x"));

        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>Text to audio</h1>");
    }

    #[tokio::test]
    async fn test_converted_audio_is_served() {
        let fx = Fixture::new();
        let app = fx.app(&good_envelope(b"ID3audio"));

        let response = app
            .clone()
            .oneshot(json_convert(serde_json::json!({
                "conversation": "[]",
                "speaker_data": "{}"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(get_request(&format!("/audio/{}", OUTPUT_FILE_NAME)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ID3audio");
    }

    #[tokio::test]
    async fn test_health() {
        let fx = Fixture::new();
        let app = fx.app(&good_envelope(b"x"));

        let response = app.oneshot(get_request("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_audio_route_hides_non_audio_files() {
        let fx = Fixture::new();
        std::fs::write(fx.audio.path().join(".env"), "LOVA_DELFY_KEY=secret").unwrap();
        std::fs::write(fx.audio.path().join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(fx.audio.path().join(".hidden.mp3"), "x").unwrap();
        let app = fx.app(&good_envelope(b"x"));

        for uri in [
            "/audio/.env",
            "/audio/Cargo.toml",
            "/audio/.hidden.mp3",
            "/audio/..%2FCargo.toml",
            "/audio/missing.mp3",
        ] {
            let response = app.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_audio_route_serves_wav_with_content_type() {
        let fx = Fixture::new();
        std::fs::write(fx.audio.path().join("c.wav"), "RIFF").unwrap();
        let app = fx.app(&good_envelope(b"x"));

        let response = app.oneshot(get_request("/audio/c.wav")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "audio/wav");
        assert_eq!(body_string(response).await, "RIFF");
    }

    #[tokio::test]
    async fn test_conversion_finishes_after_client_hangs_up() {
        let fx = Fixture::new();
        let app = app_with_synth(
            Arc::new(SlowSynth(good_envelope(b"late"), Duration::from_millis(200))),
            fx.audio.path().into(),
            fx.views.path().into(),
        );

        let request = app.oneshot(json_convert(serde_json::json!({
            "conversation": "[]",
            "speaker_data": "{}"
        })));
        // Dropping the request future is what the server does on disconnect.
        assert!(tokio::time::timeout(Duration::from_millis(50), request)
            .await
            .is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            std::fs::read(fx.audio.path().join(OUTPUT_FILE_NAME)).unwrap(),
            b"late"
        );
    }
}
