use crate::{
    error::AppResult,
    job::JobRunner,
    metadata::Metadata,
    packager::{EncodedFile, Mode, PackagedResponse},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobRunner,
    pub default_mode: Mode,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/fetch", post(fetch))
        .route("/download", post(download))
        .route("/download_multi", post(download_multi))
        .with_state(state)
}

#[derive(Serialize)]
struct SiteStatus {
    host: String,
    credentials_configured: bool,
    credentials_present: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    extractor: String,
    default_mode: Mode,
    supported_sites_only: bool,
    sites: Vec<SiteStatus>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let sites = state
        .jobs
        .sites()
        .profiles()
        .iter()
        .map(|p| SiteStatus {
            host: p.host.clone(),
            credentials_configured: p.credentials.is_some(),
            credentials_present: p.credentials.as_deref().is_some_and(|c| c.is_file()),
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        extractor: state.jobs.extractor().program().to_string(),
        default_mode: state.default_mode,
        supported_sites_only: state.jobs.supported_sites_only(),
        sites,
    })
}

#[derive(Deserialize)]
struct FetchRequest {
    #[serde(default)]
    url: String,
}

#[derive(Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    url: String,
    mode: Option<Mode>,
}

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<EncodedFile>,
}

async fn fetch(
    State(state): State<AppState>,
    payload: Result<Json<FetchRequest>, JsonRejection>,
) -> AppResult<Json<Metadata>> {
    let Json(req) = payload?;
    let metadata = state.jobs.fetch(&req.url).await?;
    Ok(Json(metadata))
}

async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> AppResult<PackagedResponse> {
    let Json(req) = payload?;
    let mode = req.mode.unwrap_or(state.default_mode);
    Ok(state.jobs.download(&req.url, mode).await?)
}

async fn download_multi(
    State(state): State<AppState>,
    payload: Result<Json<FetchRequest>, JsonRejection>,
) -> AppResult<Json<FilesResponse>> {
    let Json(req) = payload?;
    let files = state.jobs.download_encoded(&req.url).await?;
    Ok(Json(FilesResponse { files }))
}
