use crate::config::ServerConfig;
use crate::document::{is_allowed_file, secure_filename, Document};
use crate::error::ApiError;
use crate::study::{QueryError, StudyService};
use actix_cors::Cors;
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use futures_util::StreamExt;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Multipart field carrying the uploaded document
const UPLOAD_FIELD: &str = "pdf";

/// Shared state for all request handlers
pub struct AppState {
    pub service: StudyService,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(service: StudyService, config: &ServerConfig) -> Self {
        AppState {
            service,
            upload_dir: config.upload_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub message: Option<String>,
}

/// Register the `/api` routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Rejected query body: {}", err);
        ApiError::MessageRequired.into()
    });

    cfg.app_data(json_config).service(
        web::scope("/api")
            .route("/health", web::get().to(health_check))
            .route("/process-pdf", web::post().to(process_pdf))
            .route("/query", web::post().to(query_document)),
    );
}

/// Run the HTTP server until it is shut down
pub async fn run(state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    let state = web::Data::new(state);
    info!(
        "Starting API server on http://{}:{}",
        config.host, config.port
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind(config.bind_addr())?
    .run()
    .await
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "Study Notes Generator API is running"
    }))
}

async fn process_pdf(
    state: web::Data<AppState>,
    req: HttpRequest,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let limit = state.max_upload_bytes;
    if declared_length(&req).is_some_and(|len| len > limit) {
        return Err(ApiError::TooLarge(limit));
    }

    let upload = receive_upload(&mut payload, &state.upload_dir, limit).await?;
    info!("File uploaded: {}", upload.path().display());

    let path = upload.path().to_path_buf();
    let document = web::block(move || Document::from_file(path))
        .await
        .map_err(|e| {
            error!("PDF extraction task failed: {}", e);
            ApiError::ProcessingFailed
        })?
        .map_err(|e| {
            error!("Error processing PDF: {:#}", e);
            ApiError::ProcessingFailed
        })?;

    if document.is_blank() {
        return Err(ApiError::NoText);
    }

    info!("Generating study materials...");
    let materials = state
        .service
        .generate_study_materials(&document.content)
        .await;

    Ok(HttpResponse::Ok().json(materials))
}

async fn query_document(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> Result<HttpResponse, ApiError> {
    let message = body
        .into_inner()
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or(ApiError::MessageRequired)?;

    match state.service.query_response(&message).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({ "response": response }))),
        Err(QueryError::NoDocument) => Err(ApiError::NoDocument),
        Err(QueryError::Failed(e)) => {
            error!("Error in query endpoint: {:#}", e);
            Err(ApiError::QueryFailed)
        }
    }
}

fn declared_length(req: &HttpRequest) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Stream the `pdf` field of the form into the upload directory
async fn receive_upload(
    payload: &mut Multipart,
    upload_dir: &Path,
    limit: usize,
) -> Result<TempUpload, ApiError> {
    while let Some(item) = payload.next().await {
        let field = item.map_err(rejected_upload)?;
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();

        if filename.is_empty() {
            return Err(ApiError::NoFileSelected);
        }
        if !is_allowed_file(&filename) {
            return Err(ApiError::NotPdf);
        }

        let upload = TempUpload::new(upload_dir, &filename);
        save_field(field, upload.path(), limit).await?;
        return Ok(upload);
    }

    Err(ApiError::NoFile)
}

async fn save_field(mut field: Field, path: &Path, limit: usize) -> Result<(), ApiError> {
    let write_failed = |e: std::io::Error| {
        error!("Failed to save upload {}: {}", path.display(), e);
        ApiError::ProcessingFailed
    };

    let mut file = tokio::fs::File::create(path).await.map_err(write_failed)?;
    let mut written = 0;

    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(rejected_upload)?;
        written += data.len();
        if written > limit {
            warn!("Upload exceeded {} bytes, rejecting", limit);
            return Err(ApiError::TooLarge(limit));
        }
        file.write_all(&data).await.map_err(write_failed)?;
    }

    file.flush().await.map_err(write_failed)?;
    Ok(())
}

fn rejected_upload(err: MultipartError) -> ApiError {
    warn!("Malformed multipart upload: {}", err);
    ApiError::NoFile
}

/// An uploaded file that is deleted when dropped
struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    fn new(upload_dir: &Path, filename: &str) -> Self {
        let name = secure_filename(filename);
        let name = if is_allowed_file(&name) {
            name
        } else {
            "upload.pdf".to_string()
        };

        TempUpload {
            path: upload_dir.join(format!("{}_{}", Uuid::new_v4(), name)),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("Cleaned up file: {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up file {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_UPLOAD_BYTES;
    use crate::rag::RagEngine;
    use crate::test_support::{FakeEmbedder, ScriptedModel};
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;

    const BOUNDARY: &str = "----studynotesboundary";

    fn state(upload_dir: &TempDir) -> web::Data<AppState> {
        let model = ScriptedModel::strict()
            .when("comprehensive summary", "Mitochondria turn nutrients into ATP.")
            .when(
                "key notes",
                "1. Mitochondria produce most of the cell's ATP\n2. ATP stores chemical energy",
            )
            .when(
                "flashcards",
                "Q: What do mitochondria produce?\nA: ATP.\n\nQ: What does ATP store?\nA: Chemical energy.",
            )
            .when("Question: What makes ATP?", "Mitochondria.");
        let rag = RagEngine::new(Arc::new(FakeEmbedder), Arc::new(model));
        let config = ServerConfig::new("127.0.0.1", 0, upload_dir.path());
        web::Data::new(AppState::new(StudyService::new(rag), &config))
    }

    fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
            BOUNDARY, field, filename
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> actix_test::TestRequest {
        actix_test::TestRequest::post()
            .uri("/api/process-pdf")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    async fn send(data: web::Data<AppState>, req: actix_test::TestRequest) -> (StatusCode, Value) {
        let app = actix_test::init_service(App::new().app_data(data).configure(configure)).await;
        let resp = actix_test::call_service(&app, req.to_request()).await;
        let status = resp.status();
        let body: Value = actix_test::read_body_json(resp).await;
        (status, body)
    }

    /// Single-page PDF drawing `text` in Helvetica, or only a line when empty
    fn pdf_document(text: &str) -> Vec<u8> {
        let stream = if text.is_empty() {
            "72 720 m 540 720 l S".to_string()
        } else {
            format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text)
        };
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, object) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
        }

        let xref = pdf.len();
        let mut trailer = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            trailer.push_str(&format!("{:010} 00000 n \n", offset));
        }
        trailer.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        ));
        pdf.extend_from_slice(trailer.as_bytes());
        pdf
    }

    fn upload_dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[actix_web::test]
    async fn health_reports_healthy() {
        let dir = TempDir::new().unwrap();
        let req = actix_test::TestRequest::get().uri("/api/health");

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["message"], "Study Notes Generator API is running");
    }

    #[actix_web::test]
    async fn upload_without_pdf_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        let req = upload_request(multipart_body("document", "notes.pdf", b"%PDF-1.4"));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file provided");
    }

    #[actix_web::test]
    async fn upload_without_filename_is_rejected() {
        let dir = TempDir::new().unwrap();
        let req = upload_request(multipart_body("pdf", "", b""));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file selected");
    }

    #[actix_web::test]
    async fn non_pdf_upload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let req = upload_request(multipart_body("pdf", "notes.txt", b"plain text"));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only PDF files are allowed");
        assert!(upload_dir_is_empty(&dir));
    }

    #[actix_web::test]
    async fn oversized_upload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let content = vec![b'a'; MAX_UPLOAD_BYTES + 1];
        let req = upload_request(multipart_body("pdf", "big.pdf", &content));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "File too large. Maximum size is 4MB");
        assert!(upload_dir_is_empty(&dir));
    }

    #[actix_web::test]
    async fn oversized_upload_without_length_is_rejected_while_streaming() {
        let dir = TempDir::new().unwrap();
        let content = vec![b'a'; MAX_UPLOAD_BYTES + 1];
        let mut req = upload_request(multipart_body("pdf", "big.pdf", &content)).to_request();
        req.headers_mut().remove(header::CONTENT_LENGTH);

        let app = actix_test::init_service(App::new().app_data(state(&dir)).configure(configure)).await;
        let resp = actix_test::call_service(&app, req).await;
        let status = resp.status();
        let body: Value = actix_test::read_body_json(resp).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "File too large. Maximum size is 4MB");
        assert!(upload_dir_is_empty(&dir));
    }

    #[actix_web::test]
    async fn pdf_upload_returns_study_materials() {
        let dir = TempDir::new().unwrap();
        let pdf = pdf_document("Mitochondria produce ATP for the cell");
        let req = upload_request(multipart_body("pdf", "Biology Notes.pdf", &pdf));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Mitochondria turn nutrients into ATP.");
        assert_eq!(
            body["notes"],
            json!([
                "Mitochondria produce most of the cell's ATP",
                "ATP stores chemical energy"
            ])
        );

        let flashcards = body["flashcards"].as_array().unwrap();
        assert_eq!(flashcards.len(), 2);
        assert_eq!(flashcards[0]["question"], "What do mitochondria produce?");
        assert_eq!(flashcards[0]["answer"], "ATP.");
        assert!(flashcards[0]["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(upload_dir_is_empty(&dir));
    }

    #[actix_web::test]
    async fn pdf_without_text_is_rejected() {
        let dir = TempDir::new().unwrap();
        let req = upload_request(multipart_body("pdf", "blank.pdf", &pdf_document("")));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No text could be extracted from the PDF");
        assert!(upload_dir_is_empty(&dir));
    }

    #[actix_web::test]
    async fn unreadable_pdf_fails_and_is_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let req = upload_request(multipart_body("pdf", "broken.pdf", b"this is not a pdf"));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to process PDF. Please try again.");
        assert!(upload_dir_is_empty(&dir));
    }

    #[actix_web::test]
    async fn query_requires_a_message() {
        let dir = TempDir::new().unwrap();
        let req = actix_test::TestRequest::post()
            .uri("/api/query")
            .set_json(json!({ "text": "hello" }));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required");
    }

    #[actix_web::test]
    async fn query_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        let req = actix_test::TestRequest::post()
            .uri("/api/query")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json");

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required");
    }

    #[actix_web::test]
    async fn query_before_any_upload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let req = actix_test::TestRequest::post()
            .uri("/api/query")
            .set_json(json!({ "message": "What makes ATP?" }));

        let (status, body) = send(state(&dir), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No document has been processed yet");
    }

    #[actix_web::test]
    async fn query_answers_about_the_processed_document() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir);
        data.service
            .generate_study_materials("Mitochondria produce ATP for the cell.")
            .await;
        let req = actix_test::TestRequest::post()
            .uri("/api/query")
            .set_json(json!({ "message": "What makes ATP?" }));

        let (status, body) = send(data, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Mitochondria.");
    }

    #[actix_web::test]
    async fn query_model_failure_is_a_server_error() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir);
        data.service
            .generate_study_materials("Mitochondria produce ATP for the cell.")
            .await;
        let req = actix_test::TestRequest::post()
            .uri("/api/query")
            .set_json(json!({ "message": "Something the model refuses" }));

        let (status, body) = send(data, req).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to get response");
    }

    #[test]
    fn temp_upload_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let upload = TempUpload::new(dir.path(), "Lecture 1.pdf");
        std::fs::write(upload.path(), b"%PDF").unwrap();

        let name = upload.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.ends_with("_Lecture_1.pdf"));

        drop(upload);
        assert!(upload_dir_is_empty(&dir));
    }

    #[test]
    fn unsafe_names_fall_back_to_a_pdf_name() {
        let dir = TempDir::new().unwrap();
        let upload = TempUpload::new(dir.path(), "___.pdf");
        assert_eq!(upload.path().extension().unwrap(), "pdf");
    }
}
