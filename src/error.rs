use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Errors returned to HTTP clients as `{"error": message}`
///
/// Messages are fixed strings; underlying causes are logged where they occur.
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("No file provided")]
    NoFile,
    #[error("No file selected")]
    NoFileSelected,
    #[error("Only PDF files are allowed")]
    NotPdf,
    #[error("File too large. Maximum size is {}MB", .0 / (1024 * 1024))]
    TooLarge(usize),
    #[error("No text could be extracted from the PDF")]
    NoText,
    #[error("Message is required")]
    MessageRequired,
    #[error("No document has been processed yet")]
    NoDocument,
    #[error("Failed to process PDF. Please try again.")]
    ProcessingFailed,
    #[error("Failed to get response")]
    QueryFailed,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ProcessingFailed | ApiError::QueryFailed => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
