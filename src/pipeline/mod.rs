// src/pipeline/mod.rs
pub mod heuristic;
pub mod llm;

use serde::Serialize;

use crate::extractors::section::SectionTarget;
use crate::extractors::table::TableResult;

pub use heuristic::HeuristicPipeline;
pub use llm::LlmPipeline;

/// What one section (or, in the model pipeline, one relevant page) produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub section_name: String,
    pub physical_page: usize,
    pub logical_page: Option<u32>,
    /// Every page the section text was read from.
    pub pages: Vec<usize>,
    pub section_found: bool,
    pub text: String,
    pub tables: Vec<TableResult>,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn for_target(target: &SectionTarget) -> Self {
        Self {
            section_name: target.name.clone(),
            physical_page: target.physical_page,
            logical_page: target.logical_page,
            pages: Vec::new(),
            section_found: false,
            text: String::new(),
            tables: Vec::new(),
            error: None,
        }
    }

    /// An empty result carrying the reason the section could not be read.
    pub fn failed(target: &SectionTarget, error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::for_target(target) }
    }

    /// "consolidated_page" -> "Consolidated Page"
    pub fn title(&self) -> String {
        self.section_name
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    /// "Page 176 (Logical page 346)"
    pub fn provenance(&self) -> String {
        match self.logical_page {
            Some(logical) => format!("Page {} (Logical page {})", self.physical_page, logical),
            None => format!("Page {}", self.physical_page),
        }
    }
}

/// Results keyed by section name, kept in the order they were produced.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ExtractionSet {
    results: Vec<ExtractionResult>,
}

impl ExtractionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a result, replacing any earlier one with the same name.
    pub fn insert(&mut self, result: ExtractionResult) {
        match self.results.iter_mut().find(|r| r.section_name == result.section_name) {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExtractionResult> {
        self.results.iter().find(|r| r.section_name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractionResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn table_count(&self) -> usize {
        self.results.iter().map(|r| r.tables.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> SectionTarget {
        SectionTarget {
            name: name.to_string(),
            physical_page: 176,
            logical_page: Some(346),
            heading: "notes to consolidated financial statement".to_string(),
        }
    }

    #[test]
    fn titles_and_provenance() {
        let result = ExtractionResult::for_target(&target("consolidated_page"));
        assert_eq!(result.title(), "Consolidated Page");
        assert_eq!(result.provenance(), "Page 176 (Logical page 346)");

        let mut page = ExtractionResult::for_target(&target("Page_no_12"));
        page.logical_page = None;
        assert_eq!(page.title(), "Page No 12");
        assert_eq!(page.provenance(), "Page 176");
    }

    #[test]
    fn set_keeps_insertion_order_and_replaces_by_name() {
        let mut set = ExtractionSet::new();
        set.insert(ExtractionResult::for_target(&target("standalone")));
        set.insert(ExtractionResult::for_target(&target("consolidated")));
        set.insert(ExtractionResult::failed(&target("standalone"), "page 214 out of range"));

        let names: Vec<&str> = set.iter().map(|r| r.section_name.as_str()).collect();
        assert_eq!(names, vec!["standalone", "consolidated"]);
        assert_eq!(set.get("standalone").and_then(|r| r.error.as_deref()), Some("page 214 out of range"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.table_count(), 0);
    }
}
