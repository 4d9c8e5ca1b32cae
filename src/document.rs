use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::path::Path;

/// Extension accepted by the upload endpoint
pub const ALLOWED_EXTENSION: &str = "pdf";

/// Text pulled out of an uploaded document
#[derive(Debug, Clone)]
pub struct Document {
    /// Normalised text content of the document
    pub content: String,
}

impl Document {
    /// Load a document from a file path and extract its text
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let mime_type = from_path(path).first_or_octet_stream().to_string();
        debug!("Detected MIME type for {}: {}", path.display(), mime_type);

        let content = read_document_content(path, &mime_type)?;
        Ok(Document { content })
    }

    /// True when extraction produced nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Read text from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    if !mime_type.starts_with("application/pdf") {
        return Err(anyhow::anyhow!(
            "Unsupported document format: {}. Only PDF files are supported.",
            mime_type
        ));
    }

    info!("Extracting text from PDF: {}", path.display());
    let content = extract_text(path)
        .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

    let cleaned_content = normalize_whitespace(&content);

    if cleaned_content.is_empty() {
        warn!("Extracted PDF content is empty or contains only whitespace");
    }

    Ok(cleaned_content)
}

/// Check that an uploaded file name carries the `.pdf` extension
pub fn is_allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case(ALLOWED_EXTENSION))
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to something safe to join onto the upload directory
pub fn secure_filename(filename: &str) -> String {
    // Only the last path component is kept, whichever separator the client used
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();

    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// Normalize whitespace in text (collapse repeated spaces and blank lines)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
            continue;
        }

        if newline_count > 0 {
            push_line_break(&mut normalized, newline_count);
            newline_count = 0;
        }

        if !(c == ' ' && prev_char == ' ') {
            normalized.push(c);
        }
        prev_char = c;
    }

    if newline_count > 0 {
        push_line_break(&mut normalized, newline_count);
    }

    normalized.trim().to_string()
}

// At most one blank line survives between paragraphs
fn push_line_break(out: &mut String, newline_count: usize) {
    if newline_count >= 2 {
        out.push_str("\n\n");
    } else {
        out.push('\n');
    }
}
