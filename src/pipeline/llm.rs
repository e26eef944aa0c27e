// src/pipeline/llm.rs
use std::path::{Path, PathBuf};

use crate::extractors::locator::keyword_prefilter;
use crate::extractors::section::{debug_patterns, extract_section};
use crate::extractors::table::{parse_markdown_tables, table_from_text, TableResult};
use crate::gateway::{Classifier, LanguageModel, Relevance};
use crate::pdf::{write_page_subset, Page, PdfBackend, StructureRecognizer};
use crate::pipeline::{ExtractionResult, ExtractionSet};
use crate::utils::error::PdfError;
use crate::utils::text_debug::save_annotated_text;

pub const RELEVANT_PAGES_FILE: &str = "relevant_pages.pdf";

/// Result key for a relevant page.
pub fn page_key(page: usize) -> String {
    format!("Page_no_{}", page)
}

/// Model-gated extraction: prefilter, two classification stages, then
/// per-page tables judged by the model.
pub struct LlmPipeline<'a, M: LanguageModel> {
    backend: &'a dyn PdfBackend,
    classifier: Classifier<'a, M>,
    recognizer: Option<&'a dyn StructureRecognizer>,
    text_tables: bool,
    output_dir: PathBuf,
    debug_dir: Option<PathBuf>,
}

impl<'a, M: LanguageModel> LlmPipeline<'a, M> {
    pub fn new(backend: &'a dyn PdfBackend, classifier: Classifier<'a, M>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            classifier,
            recognizer: None,
            text_tables: true,
            output_dir: output_dir.into(),
            debug_dir: None,
        }
    }

    pub fn with_recognizer(mut self, recognizer: &'a dyn StructureRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_text_tables(mut self, enabled: bool) -> Self {
        self.text_tables = enabled;
        self
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Reads every page once; pages that fail to decode are skipped.
    fn load_pages(&self, pdf: &Path) -> Result<Vec<Page>, PdfError> {
        let doc = self.backend.open(pdf)?;
        let mut pages = Vec::with_capacity(doc.page_count());
        for number in 1..=doc.page_count() {
            match doc.page(number) {
                Ok(page) => pages.push(page),
                Err(e) => tracing::warn!("Skipping page {}: {}", number, e),
            }
        }
        Ok(pages)
    }

    /// Pages that survive the keyword prefilter and both model stages.
    pub async fn relevant_pages(&self, pages: &[Page]) -> Vec<Page> {
        let candidates = keyword_prefilter(pages);
        tracing::info!("Prefiltered {} page(s) mentioning contingent liabilities", candidates.len());

        let mut relevant = Vec::new();
        for page in candidates {
            if self.classifier.is_relevant_page(page.number, &page.text).await {
                tracing::info!("Page {} confirmed relevant", page.number);
                relevant.push(page.clone());
            }
        }
        relevant
    }

    pub async fn run(&self, pdf: &Path) -> Result<ExtractionSet, PdfError> {
        let pages = self.load_pages(pdf)?;
        let relevant = self.relevant_pages(&pages).await;

        let mut set = ExtractionSet::new();
        if relevant.is_empty() {
            tracing::warn!("No relevant pages found");
            return Ok(set);
        }

        let numbers: Vec<usize> = relevant.iter().map(|p| p.number).collect();
        tracing::info!("Relevant pages: {:?}", numbers);
        let subset = self.output_dir.join(RELEVANT_PAGES_FILE);
        match write_page_subset(pdf, &numbers, &subset) {
            Ok(n) => tracing::info!("Saved {} relevant page(s) to {}", n, subset.display()),
            Err(e) => tracing::warn!("Could not write {}: {}", subset.display(), e),
        }

        for page in &relevant {
            set.insert(self.extract_page(pdf, page).await);
        }
        Ok(set)
    }

    /// Text and model-approved tables for one relevant page.
    pub async fn extract_page(&self, pdf: &Path, page: &Page) -> ExtractionResult {
        let section = extract_section(&page.text, page.number);
        self.dump(page.number, &page.text);

        let markdown = self.recognizer.and_then(|r| match r.page_markdown(pdf, page.number) {
            Ok(md) => Some(md),
            Err(e) => {
                tracing::warn!("{}: page {} failed: {}", r.name(), page.number, e);
                None
            }
        });

        let mut candidates: Vec<TableResult> = Vec::new();
        if let Some(md) = &markdown {
            candidates.extend(parse_markdown_tables(md, Some(page.number)));
        }
        if self.text_tables {
            candidates.extend(table_from_text(&section.text, Some(page.number)));
        }
        tracing::debug!("Page {}: {} candidate table(s)", page.number, candidates.len());

        let mut tables = Vec::new();
        for (i, table) in candidates.into_iter().enumerate() {
            let verdict = self.classifier.classify_table(&table).await;
            tracing::info!("Page {} table {}: {:?}", page.number, i + 1, verdict);
            if verdict == Relevance::Relevant {
                tables.push(table);
            }
        }

        if tables.is_empty() {
            let source = markdown.as_deref().unwrap_or(page.text.as_str());
            if let Some(table) = self.classifier.extract_table(source, Some(page.number)).await {
                tracing::info!("Page {}: model extracted a {}-row table", page.number, table.rows.len());
                tables.push(table);
            }
        }

        ExtractionResult {
            section_name: page_key(page.number),
            physical_page: page.number,
            logical_page: None,
            pages: vec![page.number],
            section_found: section.found,
            text: section.text,
            tables,
            error: None,
        }
    }

    fn dump(&self, page: usize, text: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let path = dir.join(format!("{}.txt", page_key(page)));
        if let Err(e) = save_annotated_text(text, &path, &debug_patterns()) {
            tracing::warn!("Failed to write debug dump {}: {}", path.display(), e);
        }
    }
}
