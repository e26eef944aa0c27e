// src/storage/mod.rs
pub mod document;
pub mod workbook;

use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::ExtractionSet;
use crate::utils::error::StorageError;

pub const WORKBOOK_FILE: &str = "contingent_liabilities_extracted.xlsx";
pub const DOCUMENT_FILE: &str = "contingent_liabilities_extracted.docx";
pub const METADATA_FILE: &str = "extraction_meta.json";
pub const DEBUG_DIR: &str = "debug";

/// Drops control characters that XML 1.0 can't carry, keeping newlines and tabs.
/// Both Office writers put text through this.
pub fn strip_control_chars(value: &str) -> String {
    value.chars().filter(|c| !c.is_control() || matches!(c, '\n' | '\t')).collect()
}

/// Owns the output directory and every artifact written into it.
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager, creating the directory if needed
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }
        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.base_dir.join(DEBUG_DIR)
    }

    /// Excel output: Summary, Extracted Text and one sheet per table.
    pub fn save_workbook(&self, results: &ExtractionSet) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(WORKBOOK_FILE);
        workbook::write_workbook(results, &file_path)?;
        Ok(file_path)
    }

    /// Word output with one heading per section.
    pub fn save_document(&self, results: &ExtractionSet) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(DOCUMENT_FILE);
        document::write_document(results, &file_path)?;
        Ok(file_path)
    }

    /// Saves per-section metadata in JSON format
    pub fn save_metadata(&self, source_pdf: &Path, mode: &str, results: &ExtractionSet) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(METADATA_FILE);

        let sections: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "section": r.section_name,
                    "title": r.title(),
                    "physical_page": r.physical_page,
                    "logical_page": r.logical_page,
                    "pages": r.pages,
                    "section_found": r.section_found,
                    "text_length": r.text.chars().count(),
                    "tables": r.tables.iter().map(|t| serde_json::json!({
                        "source": t.source,
                        "page": t.page,
                        "columns": t.columns,
                        "rows": t.rows.len(),
                        "headers": t.headers,
                    })).collect::<Vec<_>>(),
                    "error": r.error,
                })
            })
            .collect();

        let metadata = serde_json::json!({
            "source_pdf": source_pdf.display().to_string(),
            "mode": mode,
            "section_count": results.len(),
            "table_count": results.table_count(),
            "sections": sections,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }
}
