//! HTTP upload/download front end.
//!
//! A small axum application around [`crate::batch::convert_batch`]:
//!
//! | Route                | Purpose                                         |
//! |----------------------|-------------------------------------------------|
//! | `GET /`              | upload form (multiple `.md` files)              |
//! | `POST /convert`      | multipart upload, HTML page with download links |
//! | `POST /api/convert`  | multipart upload, JSON batch report             |
//! | `GET /download/:id`  | converted PDF as an attachment                  |
//! | `GET /health`        | liveness probe                                  |
//!
//! Converted PDFs are kept in an in-memory [`ArtifactStore`] keyed by UUID.
//! The store is bounded; once full, the oldest artifact is evicted.

use crate::batch::{self, Upload};
use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::output::{DocumentReport, DocumentResult};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Listen address used when none is given.
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

const PAGE_TITLE: &str = "MDPDFusion: Markdown to PDF Converter";

// ── Options ──────────────────────────────────────────────────────────────

/// Settings for the HTTP front end itself (conversion settings live in
/// [`ConversionConfig`]).
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub bind: SocketAddr,
    /// Largest accepted request body, in bytes. Default: 200 MiB.
    pub max_upload_bytes: usize,
    /// Converted PDFs kept for download. Default: 256.
    pub store_capacity: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            max_upload_bytes: 200 * 1024 * 1024,
            store_capacity: 256,
        }
    }
}

// ── Artifact store ───────────────────────────────────────────────────────

/// A converted PDF waiting to be downloaded.
#[derive(Debug, Clone)]
pub struct StoredPdf {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Bounded in-memory map of download id → PDF, evicting oldest first.
#[derive(Debug)]
pub struct ArtifactStore {
    capacity: usize,
    order: VecDeque<Uuid>,
    items: HashMap<Uuid, StoredPdf>,
}

impl ArtifactStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            items: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, file_name: String, bytes: Bytes) -> Uuid {
        while self.items.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.items.remove(&oldest);
                }
                None => break,
            }
        }
        let id = Uuid::new_v4();
        self.order.push_back(id);
        self.items.insert(id, StoredPdf { file_name, bytes });
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<StoredPdf> {
        self.items.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ── State & router ───────────────────────────────────────────────────────

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ConversionConfig>,
    store: Arc<Mutex<ArtifactStore>>,
}

impl AppState {
    pub fn new(config: ConversionConfig, store_capacity: usize) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(ArtifactStore::new(store_capacity))),
        }
    }

    fn store_pdf(&self, file_name: String, bytes: Vec<u8>) -> Uuid {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.insert(file_name, Bytes::from(bytes))
    }

    fn fetch_pdf(&self, id: &Uuid) -> Option<StoredPdf> {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.get(id)
    }
}

/// Build the application router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/convert", post(convert_html))
        .route("/api/convert", post(convert_json))
        .route("/download/:id", get(download))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Bind `options.bind` and serve until the process is stopped.
#[instrument(skip(config, options), fields(bind = %options.bind))]
pub async fn serve(config: ConversionConfig, options: ServerOptions) -> Result<(), Md2PdfError> {
    let server_err = |source| Md2PdfError::Server {
        addr: options.bind.to_string(),
        source,
    };

    let app = router(
        AppState::new(config, options.store_capacity),
        options.max_upload_bytes,
    );

    let listener = TcpListener::bind(options.bind).await.map_err(server_err)?;
    info!("Upload page listening on http://{}", options.bind);
    axum::serve(listener, app).await.map_err(server_err)?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn index() -> Html<String> {
    Html(page(
        r#"<form action="/convert" method="post" enctype="multipart/form-data">
  <label for="files">Select Markdown files (.md)</label>
  <input id="files" type="file" name="files" accept=".md" multiple required>
  <button type="submit">Convert</button>
</form>"#,
    ))
}

async fn convert_html(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, ServerError> {
    let uploads = read_uploads(multipart).await?;
    let report = batch::convert_batch(uploads, &state.config).await?;
    let entries = publish(&state, report.documents);

    let mut body = String::from("<ul>\n");
    for entry in &entries {
        match (&entry.report.result, &entry.download_url) {
            (DocumentResult::Converted { pdf_name, .. }, Some(url)) => {
                let _ = writeln!(
                    body,
                    r#"  <li class="ok"><a href="{}" download="{}">Download {}</a></li>"#,
                    url,
                    escape_html(pdf_name),
                    escape_html(pdf_name)
                );
            }
            (DocumentResult::Failed { message }, _) => {
                let _ = writeln!(body, r#"  <li class="error">{}</li>"#, escape_html(message));
            }
            _ => {}
        }
    }
    body.push_str("</ul>\n<p><a href=\"/\">Convert more files</a></p>");
    Ok(Html(page(&body)))
}

async fn convert_json(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiReport>, ServerError> {
    let uploads = read_uploads(multipart).await?;
    let report = batch::convert_batch(uploads, &state.config).await?;
    let converted = report.converted_count();
    let failed = report.failed_count();
    let total_duration_ms = report.total_duration_ms;
    Ok(Json(ApiReport {
        documents: publish(&state, report.documents),
        converted,
        failed,
        total_duration_ms,
    }))
}

async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(pdf) = Uuid::parse_str(&id).ok().and_then(|id| state.fetch_pdf(&id)) else {
        return (StatusCode::NOT_FOUND, "No such download").into_response();
    };
    let disposition = format!(
        "attachment; filename=\"{}\"",
        pdf.file_name.replace(['"', '\\'], "_")
    );
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf.bytes,
    )
        .into_response()
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// JSON body of `POST /api/convert`.
#[derive(Debug, Serialize)]
pub struct ApiReport {
    pub documents: Vec<ApiDocument>,
    pub converted: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ApiDocument {
    #[serde(flatten)]
    pub report: DocumentReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// Move converted bytes into the store and attach download URLs.
fn publish(state: &AppState, documents: Vec<DocumentReport>) -> Vec<ApiDocument> {
    documents
        .into_iter()
        .map(|mut report| {
            let download_url = match &mut report.result {
                DocumentResult::Converted { pdf_name, pdf, .. } => {
                    let id = state.store_pdf(pdf_name.clone(), std::mem::take(pdf));
                    Some(format!("/download/{id}"))
                }
                DocumentResult::Failed { .. } => None,
            };
            ApiDocument {
                report,
                download_url,
            }
        })
        .collect()
}

async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, ServerError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let bytes = field.bytes().await?;
        // Browsers submit one empty part when no file was chosen.
        if file_name.is_empty() && bytes.is_empty() {
            continue;
        }
        uploads.push(Upload::new(file_name, bytes.to_vec()));
    }
    Ok(uploads)
}

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{PAGE_TITLE}</title>\n</head>\n<body>\n<h1>{PAGE_TITLE}</h1>\n{body}\n</body>\n</html>\n"
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Request-level failures; per-document failures are part of the report.
#[derive(Debug)]
enum ServerError {
    Multipart(MultipartError),
    Batch(Md2PdfError),
}

impl From<MultipartError> for ServerError {
    fn from(e: MultipartError) -> Self {
        ServerError::Multipart(e)
    }
}

impl From<Md2PdfError> for ServerError {
    fn from(e: Md2PdfError) -> Self {
        ServerError::Batch(e)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::Multipart(e) => {
                warn!("Rejected upload request: {}", e);
                e.into_response()
            }
            ServerError::Batch(e) => {
                warn!("Batch failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Unexpected error: {e}"),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "md2pdf-test-boundary";

    fn app() -> Router {
        let config = ConversionConfig::builder().use_external(false).build().unwrap();
        router(AppState::new(config, 8), 1024 * 1024)
    }

    fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: text/markdown\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, files: &[(&str, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(files)))
            .unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn index_serves_upload_form() {
        let resp = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_string(resp).await;
        assert!(html.contains("multipart/form-data"));
        assert!(html.contains("multiple"));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_string(resp).await, "ok");
    }

    #[tokio::test]
    async fn api_convert_then_download() {
        let app = app();
        let notes: &[u8] = b"# My Notes\n## Section One\nSome plain text.";
        let resp = app
            .clone()
            .oneshot(upload_request(
                "/api/convert",
                &[("notes.md", notes), ("bad.md", &[0xFF, 0xFE][..])],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["converted"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["documents"][0]["pdf_name"], "notes.pdf");
        assert_eq!(json["documents"][1]["status"], "failed");
        assert!(json["documents"][1]["download_url"].is_null());

        let url = json["documents"][0]["download_url"].as_str().unwrap().to_string();
        let resp = app
            .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"notes.pdf\""
        );
        let pdf = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn html_convert_lists_links_and_errors() {
        let resp = app()
            .oneshot(upload_request(
                "/convert",
                &[("a.md", &b"hello"[..]), ("b.txt", &b"nope"[..])],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_string(resp).await;
        assert!(html.contains("Download a.pdf"));
        assert!(html.contains("/download/"));
        assert!(html.contains("Could not convert b.txt to PDF. Please check the input file."));
    }

    #[tokio::test]
    async fn unknown_download_is_404() {
        let app = app();
        for uri in ["/download/not-a-uuid".to_string(), format!("/download/{}", Uuid::new_v4())] {
            let resp = app
                .clone()
                .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn store_evicts_oldest() {
        let mut store = ArtifactStore::new(2);
        let a = store.insert("a.pdf".into(), Bytes::from_static(b"a"));
        let b = store.insert("b.pdf".into(), Bytes::from_static(b"b"));
        let c = store.insert("c.pdf".into(), Bytes::from_static(b"c"));
        assert_eq!(store.len(), 2);
        assert!(store.get(&a).is_none());
        assert_eq!(store.get(&b).unwrap().file_name, "b.pdf");
        assert_eq!(&store.get(&c).unwrap().bytes[..], b"c");
    }

    #[test]
    fn escape_html_covers_markup() {
        assert_eq!(escape_html("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }
}
