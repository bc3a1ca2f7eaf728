//! HTTP API for the web client.
//!
//! - `POST /api/video/info`      metadata + format choices
//! - `GET  /api/video/download`  SSE progress stream for one job
//! - `GET  /api/video/file/{id}` the finished file, once
//! - `GET  /api/video/thumb`     thumbnail proxy for the Instagram CDN only
//! - `GET  /health`

use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::formats::{audio_choices, video_choices, FormatChoice};
use crate::download::metadata::{fetch_metadata, format_duration};
use crate::download::orchestrator::{DownloadJob, Downloader};
use crate::download::platform::{MediaReference, Platform};
use crate::download::progress::Mode;
use crate::download::retention::RetainedFileStore;

const THUMB_ROUTE: &str = "/api/video/thumb";

/// Shared state for the web server.
#[derive(Clone)]
pub struct WebState {
    ytdl_bin: Arc<str>,
    downloader: Downloader,
    store: Arc<RetainedFileStore>,
    http: reqwest::Client,
}

impl WebState {
    pub fn new(ytdl_bin: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        let ytdl_bin: String = ytdl_bin.into();
        let store = Arc::new(RetainedFileStore::new(work_dir));
        let downloader = Downloader::new(ytdl_bin.clone()).with_retention(Arc::clone(&store));
        let http = reqwest::Client::builder()
            .timeout(config::network::thumbnail_timeout())
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            ytdl_bin: ytdl_bin.into(),
            downloader,
            store,
            http,
        }
    }

    /// State built from environment configuration
    pub fn from_config() -> Self {
        Self::new(config::YTDL_BIN.as_str(), config::TEMP_FILES_DIR.as_path())
    }

    pub fn store(&self) -> &RetainedFileStore {
        &self.store
    }
}

/// Build the API router.
pub fn router(state: WebState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION, header::CONTENT_LENGTH]);

    Router::new()
        .route("/api/video/info", post(info_handler))
        .route("/api/video/download", get(download_handler))
        .route("/api/video/file/{id}", get(file_handler))
        .route(THUMB_ROUTE, get(thumb_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the web server.
pub async fn start_web_server(port: u16, state: WebState) -> AppResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  POST /api/video/info       - Metadata and format choices");
    log::info!("  GET  /api/video/download   - Download progress (SSE)");
    log::info!("  GET  /api/video/file/{{id}} - Finished file");
    log::info!("  GET  /health               - Health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Serialize)]
pub struct VideoInfoResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    pub duration: String,
    pub thumbnail: String,
    pub platform: Platform,
    pub formats: Vec<FormatChoice>,
}

fn supported_reference(url: &str) -> AppResult<MediaReference> {
    let reference = MediaReference::detect(url);
    if !reference.is_supported() {
        log::info!("Rejected unsupported URL: {}", reference.url);
        return Err(AppError::UnsupportedUrl);
    }
    Ok(reference)
}

/// Instagram's CDN refuses cross-origin image loads, so its thumbnails go
/// through the proxy route.
pub fn client_thumbnail(platform: Platform, thumbnail: &str) -> String {
    if platform == Platform::Instagram && !thumbnail.is_empty() {
        format!("{}?url={}", THUMB_ROUTE, URL_SAFE.encode(thumbnail))
    } else {
        thumbnail.to_string()
    }
}

/// POST /api/video/info
async fn info_handler(
    State(state): State<WebState>,
    payload: Result<Json<InfoRequest>, JsonRejection>,
) -> AppResult<Json<VideoInfoResponse>> {
    let Json(req) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let url = req
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("URL is required".to_string()))?;
    let mode = req.mode.unwrap_or_default();
    let reference = supported_reference(&url)?;

    let info = fetch_metadata(&state.ytdl_bin, &reference.url).await?;
    let formats = match mode {
        Mode::Video => video_choices(&info.formats),
        Mode::Audio => audio_choices(&info.formats),
    };
    if formats.is_empty() {
        return Err(AppError::NoSuitableFormat);
    }

    Ok(Json(VideoInfoResponse {
        id: info.id,
        title: info.title,
        author: info.uploader_name.unwrap_or_default(),
        duration: format_duration(info.duration_seconds.unwrap_or(0.0)),
        thumbnail: client_thumbnail(reference.platform, info.thumbnail_url.as_deref().unwrap_or("")),
        platform: reference.platform,
        formats,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

/// GET /api/video/download?url=&format=&mode=
///
/// One SSE stream per job. Each progress event is written as it is produced;
/// the stream ends after `done` or `error`. When the client goes away the
/// stream is dropped, which drops the job handle and kills yt-dlp.
pub async fn download_handler(
    State(state): State<WebState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let (url, format_id) = match (query.url, query.format) {
        (Some(url), Some(format)) if !url.trim().is_empty() && !format.trim().is_empty() => (url, format),
        _ => return Err(AppError::InvalidInput("url and format required".to_string())),
    };
    let reference = supported_reference(&url)?;
    let mode = query.mode.unwrap_or_default();

    let job = DownloadJob::new(mode, format_id, reference.url, state.store.dir());
    let events = state
        .downloader
        .start(job)
        .into_stream()
        .map(|event| Event::default().json_data(event));

    let headers = [
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no")),
    ];
    Ok((headers, Sse::new(events).keep_alive(KeepAlive::default())).into_response())
}

/// GET /api/video/file/{id}
///
/// The body stream owns the fetch guard, so the short deletion timer starts
/// only once the body has been sent or the client has gone away.
async fn file_handler(State(state): State<WebState>, Path(id): Path<String>) -> AppResult<Response> {
    let (file, guard) = state.store.fetch_and_mark(&id).await?;
    let handle = tokio::fs::File::open(&file.path).await.map_err(|e| {
        log::warn!("Retained file {} vanished before open: {}", file.path.display(), e);
        AppError::NotFound
    })?;
    let len = handle.metadata().await?.len();

    let body = stream::unfold((ReaderStream::new(handle), guard), |(mut reader, guard)| async move {
        let chunk = reader.next().await?;
        Some((chunk, (reader, guard)))
    });

    let disposition = format!("attachment; filename=\"{}\"", file.download_name());
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ThumbQuery {
    #[serde(default)]
    pub url: Option<String>,
}

/// Whether `host` is one of the proxied CDN domains or a subdomain of one
fn is_proxied_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    config::network::THUMBNAIL_PROXY_DOMAINS.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

fn decode_thumbnail_url(encoded: &str) -> AppResult<url::Url> {
    let invalid = || AppError::InvalidInput("invalid url".to_string());
    let bytes = URL_SAFE.decode(encoded).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    let parsed = url::Url::parse(&text).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    match parsed.host_str() {
        Some(host) if is_proxied_host(host) => Ok(parsed),
        _ => {
            log::info!("Thumbnail proxy refused host {:?}", parsed.host_str());
            Err(invalid())
        }
    }
}

/// GET /api/video/thumb?url=<base64url>
async fn thumb_handler(
    State(state): State<WebState>,
    query: Result<Query<ThumbQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let encoded = query
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::InvalidInput("url required".to_string()))?;
    let target = decode_thumbnail_url(&encoded)?;

    let upstream = state.http.get(target.clone()).send().await.inspect_err(|e| {
        log::warn!("Thumbnail fetch failed for {}: {}", target, e);
    })?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    Ok((
        status,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response())
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
