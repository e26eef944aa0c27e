// src/pdf/backend.rs
use std::path::{Path, PathBuf};
use std::process::Command;

use lopdf::Document;

use crate::pdf::page::Page;
use crate::utils::error::PdfError;

/// Opens PDF files. A document handle lives only as long as one extraction call.
pub trait PdfBackend {
    fn name(&self) -> &'static str;
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, PdfError>;
}

/// An open PDF. Page numbers are physical and 1-based.
pub trait PdfDocument {
    fn page_count(&self) -> usize;
    fn page(&self, number: usize) -> Result<Page, PdfError>;

    fn pages(&self) -> Result<Vec<Page>, PdfError> {
        (1..=self.page_count()).map(|n| self.page(n)).collect()
    }
}

pub(crate) fn check_range(number: usize, total: usize) -> Result<(), PdfError> {
    if number == 0 || number > total {
        return Err(PdfError::PageOutOfRange { page: number, total });
    }
    Ok(())
}

// --- lopdf (in-process) ---

pub struct LopdfBackend;

struct LopdfDocument {
    doc: Document,
    page_numbers: Vec<u32>,
}

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, PdfError> {
        let doc = Document::load(path).map_err(|e| PdfError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        tracing::debug!("Opened {} with lopdf ({} pages)", path.display(), page_numbers.len());
        Ok(Box::new(LopdfDocument { doc, page_numbers }))
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page(&self, number: usize) -> Result<Page, PdfError> {
        check_range(number, self.page_count())?;
        let page_no = self.page_numbers[number - 1];
        let text = self
            .doc
            .extract_text(&[page_no])
            .map_err(|e| PdfError::Extract { page: number, reason: e.to_string() })?;
        Ok(Page::new(number, text))
    }
}

// --- poppler pdftotext (layout preserving) ---

/// Shells out to poppler's `pdfinfo`/`pdftotext -layout`, which keeps the
/// column spacing the table heuristics rely on.
pub struct PdftotextBackend {
    pub pdftotext: String,
    pub pdfinfo: String,
}

impl Default for PdftotextBackend {
    fn default() -> Self {
        Self { pdftotext: "pdftotext".to_string(), pdfinfo: "pdfinfo".to_string() }
    }
}

impl PdftotextBackend {
    /// True when the `pdftotext` binary can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.pdftotext).arg("-v").output().is_ok()
    }
}

struct PdftotextDocument {
    path: PathBuf,
    tool: String,
    total: usize,
}

fn run_tool(tool: &str, args: &[&str]) -> Result<String, PdfError> {
    let output = Command::new(tool).args(args).output().map_err(|e| PdfError::Tool {
        tool: tool.to_string(),
        reason: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(PdfError::Tool {
            tool: tool.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Reads the `Pages:` line of `pdfinfo` output.
pub(crate) fn parse_pdfinfo_pages(info: &str) -> Option<usize> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

impl PdfBackend for PdftotextBackend {
    fn name(&self) -> &'static str {
        "pdftotext"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, PdfError> {
        let path_str = path.to_string_lossy();
        let info = run_tool(&self.pdfinfo, &[&path_str]).map_err(|e| PdfError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let total = parse_pdfinfo_pages(&info).ok_or_else(|| PdfError::Open {
            path: path.display().to_string(),
            reason: "pdfinfo reported no page count".to_string(),
        })?;
        tracing::debug!("Opened {} with pdftotext ({} pages)", path.display(), total);
        Ok(Box::new(PdftotextDocument {
            path: path.to_path_buf(),
            tool: self.pdftotext.clone(),
            total,
        }))
    }
}

impl PdfDocument for PdftotextDocument {
    fn page_count(&self) -> usize {
        self.total
    }

    fn page(&self, number: usize) -> Result<Page, PdfError> {
        check_range(number, self.total)?;
        let n = number.to_string();
        let path = self.path.to_string_lossy();
        let text = run_tool(&self.tool, &["-layout", "-f", &n, "-l", &n, &path, "-"])
            .map_err(|e| PdfError::Extract { page: number, reason: e.to_string() })?;
        Ok(Page::new(number, text.trim_end_matches('\u{c}').to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdfinfo_page_count() {
        let info = "Title:          Annual Report\nProducer:       Acrobat\nPages:          432\nEncrypted:      no\n";
        assert_eq!(parse_pdfinfo_pages(info), Some(432));
        assert_eq!(parse_pdfinfo_pages("Title: x\n"), None);
    }

    #[test]
    fn page_range_is_checked() {
        assert!(check_range(1, 3).is_ok());
        assert!(matches!(check_range(0, 3), Err(PdfError::PageOutOfRange { page: 0, total: 3 })));
        assert!(matches!(check_range(4, 3), Err(PdfError::PageOutOfRange { page: 4, total: 3 })));
    }

    #[test]
    fn missing_pdftotext_is_unavailable() {
        let backend = PdftotextBackend {
            pdftotext: "/nonexistent/bin/pdftotext".to_string(),
            ..PdftotextBackend::default()
        };
        assert!(!backend.is_available());
    }

    #[test]
    fn missing_file_fails_to_open() {
        let err = LopdfBackend.open(Path::new("/nonexistent/report.pdf")).err();
        assert!(matches!(err, Some(PdfError::Open { .. })));
    }
}
