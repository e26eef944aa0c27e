// src/pipeline/heuristic.rs
use std::path::{Path, PathBuf};

use crate::extractors::section::{debug_patterns, Section, SectionStrategy, SectionTarget};
use crate::extractors::table::{reconstruct_tables, TableInput, TableResult, TableSource, TableStrategy};
use crate::pdf::PdfBackend;
use crate::pipeline::{ExtractionResult, ExtractionSet};
use crate::utils::error::PdfError;
use crate::utils::text_debug::save_annotated_text;

// Structure tables need at least this many vocabulary hits to be kept.
const MIN_KEYWORD_SCORE: usize = 1;

/// Regex-and-whitespace extraction of each configured section.
pub struct HeuristicPipeline<'a> {
    backend: &'a dyn PdfBackend,
    sections: &'a dyn SectionStrategy,
    tables: &'a [Box<dyn TableStrategy>],
    debug_dir: Option<PathBuf>,
}

impl<'a> HeuristicPipeline<'a> {
    pub fn new(
        backend: &'a dyn PdfBackend,
        sections: &'a dyn SectionStrategy,
        tables: &'a [Box<dyn TableStrategy>],
    ) -> Self {
        Self { backend, sections, tables, debug_dir: None }
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Runs every target in order. A target that fails is recorded with its
    /// error and the run moves on.
    pub fn run(&self, pdf: &Path, targets: &[SectionTarget]) -> ExtractionSet {
        let mut set = ExtractionSet::new();
        for target in targets {
            tracing::info!(
                "Extracting '{}' from page {} with the {} strategy",
                target.name,
                target.physical_page,
                self.sections.name()
            );
            let result = match self.extract_target(pdf, target) {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("{}: extraction failed: {}", target.name, e);
                    ExtractionResult::failed(target, e.to_string())
                }
            };
            set.insert(result);
        }
        set
    }

    /// One section: open, read, close, then rebuild its tables.
    pub fn extract_target(&self, pdf: &Path, target: &SectionTarget) -> Result<ExtractionResult, PdfError> {
        let section = {
            let doc = self.backend.open(pdf)?;
            let section = match self.sections.extract(doc.as_ref(), target) {
                Ok(section) => section,
                Err(e @ PdfError::PageOutOfRange { .. }) => {
                    tracing::error!("{}: {}", target.name, e);
                    return Ok(ExtractionResult::failed(target, e.to_string()));
                }
                Err(e) => return Err(e),
            };
            if self.debug_dir.is_some() {
                if let Ok(page) = doc.page(target.physical_page) {
                    self.dump(&format!("{}_page_{}.txt", target.name, page.number), &page.text);
                }
            }
            section
        };

        self.dump(&format!("{}_section.txt", target.name), &section.text);

        let tables = self.tables_for(pdf, &section);
        tracing::info!(
            "{}: {} chars of section text, {} table(s)",
            target.name,
            section.text.len(),
            tables.len()
        );

        Ok(ExtractionResult {
            pages: section.pages,
            section_found: section.found,
            text: section.text,
            tables,
            ..ExtractionResult::for_target(target)
        })
    }

    fn tables_for(&self, pdf: &Path, section: &Section) -> Vec<TableResult> {
        if section.text.trim().is_empty() {
            return Vec::new();
        }
        let input = TableInput { text: &section.text, pdf, pages: &section.pages };
        reconstruct_tables(self.tables, &input)
            .into_iter()
            .filter(|table| match table.source {
                TableSource::Text => true,
                _ => {
                    let score = table.keyword_score();
                    if score < MIN_KEYWORD_SCORE {
                        tracing::debug!("Dropping {:?} table from page {:?} (score {})", table.source, table.page, score);
                    }
                    score >= MIN_KEYWORD_SCORE
                }
            })
            .collect()
    }

    fn dump(&self, file_name: &str, text: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        if let Err(e) = save_annotated_text(text, &dir.join(file_name), &debug_patterns()) {
            tracing::warn!("Failed to write debug dump {}: {}", file_name, e);
        }
    }
}
