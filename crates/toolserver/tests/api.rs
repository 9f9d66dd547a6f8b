#![cfg(unix)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use galleryjob_toolserver::{
    extractor::Extractor, router, sites::SiteTable, AppState, JobRunner, Mode, WorkspaceRoot,
};
use serde_json::{json, Value};
use std::{io::Read, path::Path, time::Duration};
use tower::ServiceExt;

/// Fake extractor: in dump mode prints a gallery's metadata with noise in
/// between, otherwise writes two files into the destination directory.
const FAKE_TOOL: &str = r#"
dump=0
while [ $# -gt 1 ]; do
  case "$1" in
    --destination) dest="$2" ;;
    --dump-json) dump=1 ;;
  esac
  shift
done
case "$1" in
  *fail*) echo 'error: Unsupported URL' >&2; exit 1 ;;
  *empty*) exit 0 ;;
esac
if [ "$dump" = 1 ]; then
  echo '{"id":1,"extension":"jpg"}'
  echo '[warning] rate limited, retrying'
  case "$1" in
    *single*) ;;
    *) echo '{"id":2,"extension":"mp4"}' ;;
  esac
  exit 0
fi
case "$1" in
  *unicode*) printf 'PHOTO' > "$dest/写真_1.jpg"; exit 0 ;;
esac
mkdir -p "$dest/site/user"
printf 'JPEGDATA' > "$dest/site/user/b.jpg"
case "$1" in
  *single*) ;;
  *) printf 'MP4DATA' > "$dest/site/a.mp4" ;;
esac
"#;

fn app(root: &Path, default_mode: Mode) -> Router {
    let extractor = Extractor::new("sh", Duration::from_secs(10), Duration::from_secs(10)).with_extra_args(vec![
        "-c".into(),
        FAKE_TOOL.into(),
        "gallery-dl".into(),
    ]);
    let jobs = JobRunner::new(
        WorkspaceRoot::ensure(root).expect("root should be created"),
        extractor,
        SiteTable::parse("instagram.com=/nonexistent/ig.txt,x.com").expect("sites should parse"),
        false,
    );
    router(AppState { jobs, default_mode })
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    post_raw(app, uri, body.to_string()).await
}

async fn post_raw(app: &Router, uri: &str, body: String) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request should build");
    let response = app.clone().oneshot(request).await.expect("router should respond");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
    (status, headers, bytes.to_vec())
}

fn assert_root_empty(root: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(root).unwrap().collect();
    assert!(leftovers.is_empty(), "workspace leaked: {leftovers:?}");
}

#[tokio::test]
async fn health_reports_sites() {
    let tmp = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request should build");
    let response = app(tmp.path(), Mode::Single).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["extractor"], "sh");
    assert_eq!(body["default_mode"], "single");
    assert_eq!(body["sites"][0]["host"], "instagram.com");
    assert_eq!(body["sites"][0]["credentials_configured"], true);
    assert_eq!(body["sites"][0]["credentials_present"], false);
}

#[tokio::test]
async fn fetch_returns_list_for_galleries_and_object_for_single_items() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let (status, _, body) = post(&app, "/fetch", json!({"url": "https://x.com/u/status/1"})).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!([{"id": 1, "extension": "jpg"}, {"id": 2, "extension": "mp4"}]));

    let (status, _, body) = post(&app, "/fetch", json!({"url": "https://x.com/single"})).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"id": 1, "extension": "jpg"}));
}

#[tokio::test]
async fn fetch_failures_carry_detail() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let (status, _, body) = post(&app, "/fetch", json!({"url": "https://x.com/fail"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["detail"], "extraction failed: error: Unsupported URL");

    let (status, _, body) = post(&app, "/fetch", json!({"url": "https://x.com/empty"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["detail"], "no metadata records were produced");

    let (status, _, body) = post(&app, "/fetch", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].as_str().unwrap().contains("url"));
}

#[tokio::test]
async fn download_single_passes_file_through() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let (status, headers, body) = post(&app, "/download", json!({"url": "https://x.com/single"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"b.jpg\"");
    assert_eq!(body, b"JPEGDATA");
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn download_single_falls_back_to_zip() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let (status, headers, body) = post(&app, "/download", json!({"url": "https://x.com/gallery"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"gallery.zip\"");

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(body)).unwrap();
    assert_eq!(archive.len(), 2);
    let mut contents = String::new();
    archive.by_name("site/a.mp4").unwrap().read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "MP4DATA");
    contents.clear();
    archive.by_name("site/user/b.jpg").unwrap().read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "JPEGDATA");
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn download_mode_override_multipart() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let (status, headers, body) = post(
        &app,
        "/download",
        json!({"url": "https://x.com/gallery", "mode": "multipart"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_TYPE],
        "multipart/form-data; boundary=X-GALLERY-BOUNDARY"
    );
    let expected = concat!(
        "--X-GALLERY-BOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"a.mp4\"\r\n",
        "Content-Type: video/mp4\r\n\r\n",
        "MP4DATA\r\n",
        "--X-GALLERY-BOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"b.jpg\"\r\n",
        "Content-Type: image/jpeg\r\n\r\n",
        "JPEGDATA\r\n",
        "--X-GALLERY-BOUNDARY--\r\n",
    );
    assert_eq!(String::from_utf8(body).unwrap(), expected);
}

#[tokio::test]
async fn download_json_list_from_deployment_default() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::JsonList);

    let (status, _, body) = post(&app, "/download", json!({"url": "https://x.com/gallery"})).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body,
        json!([
            {"index": 0, "filename": "a.mp4", "mime": "video/mp4", "size": 7, "data_base64": "TVA0REFUQQ=="},
            {"index": 1, "filename": "b.jpg", "mime": "image/jpeg", "size": 8, "data_base64": "SlBFR0RBVEE="},
        ])
    );
}

#[tokio::test]
async fn download_multi_wraps_files() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Archive);

    let (status, _, body) = post(&app, "/download_multi", json!({"url": "https://x.com/gallery"})).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[1]["filename"], "b.jpg");
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn download_failures_are_distinguishable() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let (status, _, body) = post(&app, "/download", json!({"url": "https://x.com/empty"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["detail"], "no files were downloaded");

    let (status, _, body) = post(&app, "/download", json!({"url": "https://x.com/fail"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].as_str().unwrap().starts_with("extraction failed"));

    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn malformed_bodies_get_json_detail() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let cases = [
        ("/download", json!({"url": 5}).to_string()),
        ("/download", json!({"url": "https://x.com/g", "mode": "tarball"}).to_string()),
        ("/fetch", "not json".to_string()),
        ("/download_multi", json!(["https://x.com/g"]).to_string()),
    ];
    for (uri, body) in cases {
        let (status, headers, body) = post_raw(&app, uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(!body["detail"].as_str().unwrap().is_empty());
    }
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn download_accepts_mode_aliases() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let (status, headers, _) = post(&app, "/download", json!({"url": "https://x.com/single", "mode": "zip"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");

    let (status, _, body) = post(&app, "/download", json!({"url": "https://x.com/single", "mode": "json"})).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body[0]["filename"], "b.jpg");
}

#[tokio::test]
async fn download_single_keeps_non_ascii_file_name() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Mode::Single);

    let (status, headers, body) = post(&app, "/download", json!({"url": "https://x.com/unicode"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"PHOTO");

    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"___1.jpg\""));
    let encoded = disposition.split("filename*=UTF-8''").nth(1).expect("extended file name");
    let name = percent_encoding::percent_decode_str(encoded).decode_utf8().unwrap();
    assert_eq!(name, "写真_1.jpg");
}
