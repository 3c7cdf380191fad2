//! Defines the HTTP surface of the image bucket service.
//!
//! ## Structure
//! - `POST /api/upload`            — upload one image into a bucket (multipart `bucket` + `image`)
//! - `GET  /images/{bucket}/{file}` — public static access to stored files
//! - `GET  /healthz`, `GET /readyz` — liveness and readiness checks
//!
//! Anything else falls through to a plain-text 404.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::upload_image,
    },
    state::{AppState, IMAGES_MOUNT},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Build the application router with its state applied.
///
/// The `/images` mount serves straight from the storage root, so every
/// stored file is reachable by URL without authentication.
pub fn routes(state: AppState) -> Router {
    let images = ServeDir::new(&state.storage.base_path);
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/upload", post(upload_image).layer(body_limit))
        .nest_service(IMAGES_MOUNT, images)
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Page not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage_service::StorageService;
    use axum::{
        body::Body,
        http::{Request, Response, header},
    };
    use futures::future::join_all;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::{
        collections::HashSet,
        path::{Path, PathBuf},
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "image-buckets-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    /// Upload root and its staging sibling inside one temp dir.
    struct Layout {
        _tmp: TempDir,
        root: PathBuf,
        staging: PathBuf,
    }

    impl Layout {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path().join("uploads");
            let staging = StorageService::new(&root).staging_path;
            Self {
                _tmp: tmp,
                root,
                staging,
            }
        }

        fn app(&self) -> Router {
            self.app_with_limit(1024 * 1024)
        }

        fn app_with_limit(&self, max_upload_bytes: usize) -> Router {
            routes(AppState {
                storage: StorageService::new(&self.root),
                public_url: "http://localhost:3000".into(),
                max_upload_bytes,
            })
        }
    }

    fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Sorted entry names; a directory that was never created is empty.
    fn dir_names(path: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(path) else {
            return Vec::new();
        };
        let mut names = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[tokio::test]
    async fn upload_then_fetch_round_trips_bytes() {
        let layout = Layout::new();
        let app = layout.app();
        let png = b"\x89PNG\r\n\x1a\nfake image payload";

        let response = app
            .clone()
            .oneshot(multipart_request(&[
                Part::Text("bucket", "photos"),
                Part::File("image", "cat.png", png),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        let url = body["url"].as_str().unwrap();
        let prefix = "http://localhost:3000/images/photos/";
        assert!(url.starts_with(prefix), "{url}");
        assert!(url.ends_with(".png"), "{url}");

        let file_name = &url[prefix.len()..];
        let (millis, rest) = file_name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert!(rest.trim_end_matches(".png").parse::<u32>().is_ok());
        assert_eq!(dir_names(&layout.root), vec!["photos"]);
        assert_eq!(dir_names(&layout.root.join("photos")), vec![file_name]);
        assert!(dir_names(&layout.staging).is_empty());

        let fetched = app
            .oneshot(
                Request::builder()
                    .uri(format!("/images/photos/{}", file_name))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        let bytes = fetched.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], &png[..]);
    }

    #[tokio::test]
    async fn image_before_bucket_is_accepted() {
        let layout = Layout::new();
        let response = layout
            .app()
            .oneshot(multipart_request(&[
                Part::File("image", "dog.jpeg", b"jpeg bytes"),
                Part::Text("bucket", "pets_2"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["url"].as_str().unwrap().ends_with(".jpeg"));
        assert_eq!(dir_names(&layout.root), vec!["pets_2"]);
    }

    #[tokio::test]
    async fn missing_image_is_rejected_without_touching_disk() {
        let layout = Layout::new();
        let response = layout
            .app()
            .oneshot(multipart_request(&[Part::Text("bucket", "photos")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(
            body,
            json!({ "success": false, "message": "No image uploaded" })
        );
        assert!(dir_names(&layout.root).is_empty());
    }

    #[tokio::test]
    async fn non_multipart_body_is_a_json_missing_image() {
        let layout = Layout::new();
        let app = layout.app();

        let urlencoded = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("bucket=photos&image=cat.png"))
            .unwrap();
        let untyped = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .body(Body::from("raw bytes"))
            .unwrap();

        for request in [urlencoded, untyped] {
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/json"
            );
            assert_eq!(
                json_body(response).await,
                json!({ "success": false, "message": "No image uploaded" })
            );
        }
        assert!(dir_names(&layout.root).is_empty());
        assert!(dir_names(&layout.staging).is_empty());
    }

    #[tokio::test]
    async fn empty_file_part_counts_as_missing_image() {
        let layout = Layout::new();
        let response = layout
            .app()
            .oneshot(multipart_request(&[
                Part::Text("bucket", "photos"),
                Part::File("image", "", b""),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "No image uploaded");
        assert!(dir_names(&layout.root).is_empty());
        assert!(dir_names(&layout.staging).is_empty());
    }

    #[tokio::test]
    async fn traversal_bucket_is_rejected_and_staging_cleaned() {
        let layout = Layout::new();
        let response = layout
            .app()
            .oneshot(multipart_request(&[
                Part::Text("bucket", "../escape"),
                Part::File("image", "cat.png", b"data"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(dir_names(&layout.root).is_empty());
        assert!(dir_names(&layout.staging).is_empty());
        assert!(!layout.root.parent().unwrap().join("escape").exists());
    }

    #[tokio::test]
    async fn missing_bucket_is_rejected() {
        let layout = Layout::new();
        let response = layout
            .app()
            .oneshot(multipart_request(&[Part::File("image", "cat.png", b"data")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "No bucket specified");
        assert!(dir_names(&layout.root).is_empty());
        assert!(dir_names(&layout.staging).is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_413_json() {
        let layout = Layout::new();
        let image = vec![7u8; 8 * 1024];
        let response = layout
            .app_with_limit(1024)
            .oneshot(multipart_request(&[
                Part::Text("bucket", "photos"),
                Part::File("image", "big.png", &image),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["success"], false);
        assert!(dir_names(&layout.root).is_empty());
        assert!(dir_names(&layout.staging).is_empty());
    }

    #[tokio::test]
    async fn repeated_uploads_reuse_bucket_directory() {
        let layout = Layout::new();
        let app = layout.app();

        let mut urls = Vec::new();
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(multipart_request(&[
                    Part::Text("bucket", "shared"),
                    Part::File("image", "a.gif", b"GIF89a"),
                ]))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            urls.push(json_body(response).await["url"].as_str().unwrap().to_string());
        }

        assert_ne!(urls[0], urls[1]);
        assert_eq!(dir_names(&layout.root), vec!["shared"]);
        assert_eq!(dir_names(&layout.root.join("shared")).len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_uploads_to_a_new_bucket_all_land() {
        const UPLOADS: usize = 8;
        let layout = Layout::new();
        let app = layout.app();

        let payloads = (0..UPLOADS)
            .map(|i| format!("image number {}", i).into_bytes())
            .collect::<Vec<_>>();
        let requests = payloads.iter().map(|data| {
            app.clone().oneshot(multipart_request(&[
                Part::Text("bucket", "burst"),
                Part::File("image", "shot.jpg", data),
            ]))
        });
        let responses = join_all(requests).await;

        let mut urls = HashSet::new();
        for response in responses {
            let response = response.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let url = json_body(response).await["url"].as_str().unwrap().to_string();
            urls.insert(url);
        }
        assert_eq!(urls.len(), UPLOADS);

        assert_eq!(dir_names(&layout.root), vec!["burst"]);
        let stored = dir_names(&layout.root.join("burst"));
        assert_eq!(stored.len(), UPLOADS);
        assert!(stored.iter().all(|name| !name.starts_with(".tmp-")));
        assert!(dir_names(&layout.staging).is_empty());

        // every payload survives intact under exactly one name
        let mut contents = stored
            .iter()
            .map(|name| std::fs::read(layout.root.join("burst").join(name)).unwrap())
            .collect::<Vec<_>>();
        contents.sort();
        let mut expected = payloads.clone();
        expected.sort();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn unknown_route_is_plain_404() {
        let layout = Layout::new();
        let response = layout
            .app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Page not found");
    }

    #[tokio::test]
    async fn staging_dir_is_not_served() {
        let layout = Layout::new();
        std::fs::create_dir_all(&layout.staging).unwrap();
        std::fs::write(layout.staging.join(".tmp-partial"), b"half").unwrap();

        let staging_name = layout.staging.file_name().unwrap().to_string_lossy();
        for uri in [
            "/images/.tmp-partial".to_string(),
            format!("/images/../{}/.tmp-partial", staging_name),
        ] {
            let response = layout
                .app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn health_endpoints_report_ok() {
        let layout = Layout::new();
        let app = layout.app();

        let live = app
            .clone()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(live.status(), StatusCode::OK);

        let ready = app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ready.status(), StatusCode::OK);
        assert_eq!(json_body(ready).await["checks"]["disk"]["ok"], true);
        // the disk check runs in staging and leaves nothing behind
        assert!(layout.root.is_dir());
        assert!(dir_names(&layout.root).is_empty());
        assert!(dir_names(&layout.staging).is_empty());
    }
}
