// src/pdf/structure.rs
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::pdf::subset::write_page_subset;
use crate::utils::error::PdfError;

/// Table-structure recognition treated as an opaque collaborator that turns
/// one PDF page into markdown with pipe tables.
pub trait StructureRecognizer {
    fn name(&self) -> &str;
    fn page_markdown(&self, pdf: &Path, page: usize) -> Result<String, PdfError>;
}

/// Runs the docling CLI on a single-page copy of the PDF.
pub struct DoclingCli {
    pub program: String,
}

impl DoclingCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl StructureRecognizer for DoclingCli {
    fn name(&self) -> &str {
        &self.program
    }

    fn page_markdown(&self, pdf: &Path, page: usize) -> Result<String, PdfError> {
        let scratch = tempfile::tempdir()?;
        let page_pdf = scratch.path().join(format!("page_{}.pdf", page));
        write_page_subset(pdf, &[page], &page_pdf)?;

        tracing::debug!("Running {} on page {}", self.program, page);
        let output = Command::new(&self.program)
            .arg("--to")
            .arg("md")
            .arg("--table-mode")
            .arg("accurate")
            .arg("--output")
            .arg(scratch.path())
            .arg(&page_pdf)
            .output()
            .map_err(|e| PdfError::Tool { tool: self.program.clone(), reason: e.to_string() })?;

        if !output.status.success() {
            return Err(PdfError::Tool {
                tool: self.program.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let markdown_path = page_pdf.with_extension("md");
        let markdown = fs::read_to_string(&markdown_path).map_err(|e| PdfError::Tool {
            tool: self.program.clone(),
            reason: format!("no markdown at {}: {}", markdown_path.display(), e),
        })?;
        Ok(markdown)
    }
}
