// src/utils/error.rs
#![allow(dead_code)]
use thiserror::Error;

// Errors raised while opening or reading the PDF
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to open PDF {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("Failed to extract text from page {page}: {reason}")]
    Extract { page: usize, reason: String },

    #[error("External tool '{tool}' failed: {reason}")]
    Tool { tool: String, reason: String },

    #[error("Failed to write PDF: {0}")]
    Write(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Table extraction failed ({strategy}): {reason}")]
    Table { strategy: String, reason: String },

    #[error("PDF access failed: {0}")]
    Pdf(#[from] PdfError),
}

// Errors talking to the LLM gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("Gateway token not configured (set LLM_GATEWAY_TOKEN)")]
    MissingToken,

    #[error("Failed to parse gateway response: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("Document error: {0}")]
    Document(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
