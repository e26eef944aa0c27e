// src/extractors/section.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::{Match, Regex};

use crate::extractors::locator::{locate, phrase_regex, SUBSECTION_TOKEN};
use crate::pdf::PdfDocument;
use crate::utils::error::PdfError;

// --- Constants ---
// End markers are only searched this many characters past the start match, so
// the heading itself never terminates the section.
const END_SEARCH_OFFSET: usize = 50;

// --- Regex Patterns ---
// Most specific first; the first pattern that matches wins.
pub const START_PATTERNS: &[&str] = &[
    r"(?i)\b([a-z])\)\s*contingent\s+liabilit[ieysn]*",
    r"(?i)contingent\s+liabilit[ieysn]*",
];

// i, v and x are left out so roman sub-items never close the section.
const NEXT_ITEM_PATTERN: &str = r"(?m)^[ \t]*([a-hj-uwyz])\)[ \t]+\S";
const NEXT_NOTE_PATTERN: &str = r"(?m)^[ \t]*(?:Note[ \t]+\d{1,3}\b|\d{1,3}\.[ \t]+[A-Z][a-z]+)";
const CAPS_HEADING_PATTERN: &str = r"(?m)^[ \t]*[A-Z][A-Z&,'()\-]*(?:[ \t]+[A-Z&,'()\-]+)+[ \t]*$";
const TOTAL_PATTERN: &str = r"(?im)^.*\btotal\b.*$";

static START_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    START_PATTERNS
        .iter()
        .filter_map(|pat| Regex::new(pat).ok())
        .collect()
});

static NEXT_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(NEXT_ITEM_PATTERN).expect("Failed to compile NEXT_ITEM_RE"));
static NEXT_NOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(NEXT_NOTE_PATTERN).expect("Failed to compile NEXT_NOTE_RE"));
static CAPS_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(CAPS_HEADING_PATTERN).expect("Failed to compile CAPS_HEADING_RE"));

/// Labelled patterns for annotated debug dumps.
pub fn debug_patterns() -> Vec<(&'static str, &'static str)> {
    let mut patterns: Vec<(&str, &str)> = START_PATTERNS.iter().map(|p| (*p, "start")).collect();
    patterns.push((NEXT_ITEM_PATTERN, "end-item"));
    patterns.push((NEXT_NOTE_PATTERN, "end-note"));
    patterns.push((CAPS_HEADING_PATTERN, "end-heading"));
    patterns.push((TOTAL_PATTERN, "total"));
    patterns
}

// --- Data Structures ---

/// What to look for and where to start.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionTarget {
    pub name: String,
    /// Physical page, 1-based.
    pub physical_page: usize,
    /// Printed page label, when known.
    pub logical_page: Option<u32>,
    /// e.g. "notes to consolidated financial statement"
    pub heading: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionBounds {
    pub start: usize,
    pub end: usize,
    /// False when no start pattern matched and the bounds span the whole text.
    pub found: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub pages: Vec<usize>,
    /// Offsets into the text the section was cut from.
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub found: bool,
}

impl Section {
    fn whole_page(page: usize, text: String) -> Self {
        Self { pages: vec![page], start: 0, end: text.len(), text, found: false }
    }
}

// --- Boundary detection ---

fn first_start_match(text: &str) -> Option<Match<'_>> {
    START_RES.iter().find_map(|re| re.find(text))
}

/// Letter of the sub-item the section starts at ("b" for "b) Contingent ...").
fn start_letter(start_text: &str) -> Option<char> {
    START_RES
        .first()
        .and_then(|re| re.captures(start_text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_lowercase())
}

/// Byte offset `chars` characters past `start`, clamped to the end of text.
fn offset_by_chars(text: &str, start: usize, chars: usize) -> usize {
    text[start..].char_indices().nth(chars).map_or(text.len(), |(i, _)| start + i)
}

/// First next-heading marker at or after `from`. Patterns run over the whole
/// text so their line anchors only match at real line starts.
fn find_end(text: &str, from: usize, letter: Option<char>) -> Option<usize> {
    let after = letter.unwrap_or('a');
    let item = NEXT_ITEM_RE.captures_iter(text).find_map(|caps| {
        let m = caps.get(0)?;
        let c = caps.get(1)?.as_str().chars().next()?.to_ascii_lowercase();
        (m.start() >= from && c > after).then(|| m.start())
    });
    let note = NEXT_NOTE_RE.find_iter(text).map(|m| m.start()).find(|&pos| pos >= from);
    let heading = CAPS_HEADING_RE
        .find_iter(text)
        .find(|m| m.start() >= from && !m.as_str().contains("TOTAL"))
        .map(|m| m.start());

    [item, note, heading].into_iter().flatten().min()
}

/// Start and end of the contingent-liabilities span inside `text`.
///
/// Always resolves: without a start match the whole text is returned, and
/// without an end marker the section runs to end of text.
pub fn find_bounds(text: &str) -> SectionBounds {
    let Some(start_match) = first_start_match(text) else {
        return SectionBounds { start: 0, end: text.len(), found: false };
    };

    let start = start_match.start();
    let letter = start_letter(start_match.as_str());
    let from = offset_by_chars(text, start, END_SEARCH_OFFSET);
    let end = find_end(text, from, letter).unwrap_or(text.len());

    tracing::trace!("Section bounds {}..{} (letter {:?})", start, end, letter);
    SectionBounds { start, end, found: true }
}

/// Trims `text` to the section; the whole text when nothing matches.
pub fn extract_section(text: &str, page: usize) -> Section {
    let bounds = find_bounds(text);
    Section {
        pages: vec![page],
        start: bounds.start,
        end: bounds.end,
        text: text[bounds.start..bounds.end].trim_end().to_string(),
        found: bounds.found,
    }
}

/// A "total"/"grand total" line carrying an amount.
pub fn is_total_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    lower.contains("total")
        && (line.chars().any(|c| c.is_ascii_digit())
            || line.contains('₹')
            || lower.contains("rs.")
            || lower.contains("crore")
            || lower.contains("lakh"))
}

// --- Strategies ---

/// How a section is read out of the document.
pub trait SectionStrategy {
    fn name(&self) -> &'static str;
    fn extract(&self, doc: &dyn PdfDocument, target: &SectionTarget) -> Result<Section, PdfError>;
}

/// Reads only the configured page.
pub struct FixedPageStrategy;

impl SectionStrategy for FixedPageStrategy {
    fn name(&self) -> &'static str {
        "fixed-page"
    }

    fn extract(&self, doc: &dyn PdfDocument, target: &SectionTarget) -> Result<Section, PdfError> {
        let page = doc.page(target.physical_page)?;
        let located = locate(&page, &target.heading);

        if located.is_empty() {
            tracing::warn!(
                "{}: '{}' not found on page {}, using full page",
                target.name, SUBSECTION_TOKEN, page.number
            );
            return Ok(Section::whole_page(page.number, page.text));
        }

        let section = extract_section(&located, page.number);
        if section.found {
            tracing::info!("{}: found section on page {} ({} chars)", target.name, page.number, section.text.len());
        } else {
            tracing::warn!("{}: heading pattern not found on page {}, using located text", target.name, page.number);
        }
        Ok(section)
    }
}

/// Reads forward from the configured page, column by column, until a total line.
pub struct UntilTotalStrategy;

impl SectionStrategy for UntilTotalStrategy {
    fn name(&self) -> &'static str {
        "until-total"
    }

    fn extract(&self, doc: &dyn PdfDocument, target: &SectionTarget) -> Result<Section, PdfError> {
        let total_pages = doc.page_count();
        let heading_re = phrase_regex(&target.heading);
        let token_re = phrase_regex(SUBSECTION_TOKEN);

        let first = doc.page(target.physical_page)?;
        let mut collected = String::new();
        let mut pages = Vec::new();
        let mut found_start = false;
        let mut found_total = false;

        let mut current = target.physical_page;
        while current <= total_pages && !found_total {
            tracing::debug!("{}: reading page {}", target.name, current);
            let page = if current == first.number { first.clone() } else { doc.page(current)? };

            for (label, column) in page.reading_order() {
                if found_total {
                    break;
                }
                if column.trim().is_empty() {
                    continue;
                }

                let body = if found_start {
                    column.as_str()
                } else if heading_re.is_match(&column) && token_re.is_match(&column) {
                    tracing::info!("{}: section starts on page {} {} column", target.name, current, label);
                    found_start = true;
                    let offset = first_start_match(&column).map_or(0, |m| m.start());
                    &column[offset..]
                } else {
                    continue;
                };

                if pages.last() != Some(&current) {
                    pages.push(current);
                }

                for line in body.lines() {
                    collected.push_str(line);
                    collected.push('\n');
                    if is_total_line(line) {
                        tracing::info!("{}: total line on page {} {}: {}", target.name, current, label, line.trim());
                        found_total = true;
                        break;
                    }
                }
            }

            if !found_total {
                current += 1;
            }
        }

        if !found_start {
            tracing::warn!("{}: section not found from page {}, using full page", target.name, first.number);
            return Ok(Section::whole_page(first.number, first.text));
        }
        if !found_total {
            tracing::warn!("{}: no total line before end of document", target.name);
        }

        let text = collected.trim_end().to_string();
        Ok(Section { pages, start: 0, end: text.len(), text, found: true })
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::backend::memory::MemoryBackend;
    use crate::pdf::Page;

    const SCENARIO: &str =
        "b) Contingent Liabilities\nClaims against company ₹ 10,00,000\nGrand Total ₹ 10,00,000";

    fn target(page: usize) -> SectionTarget {
        SectionTarget {
            name: "consolidated".to_string(),
            physical_page: page,
            logical_page: Some(346),
            heading: "notes to consolidated financial statement".to_string(),
        }
    }

    #[test]
    fn scenario_section_spans_both_lines() {
        let section = extract_section(SCENARIO, 1);
        assert!(section.found);
        assert_eq!(section.start, 0);
        assert!(section.text.starts_with("b) Contingent Liabilities"));
        assert!(section.text.contains("Claims against company ₹ 10,00,000"));
        assert!(section.text.ends_with("Grand Total ₹ 10,00,000"));
        assert_eq!(section.end, SCENARIO.len());
    }

    #[test]
    fn specific_start_pattern_wins() {
        let text = "Refer contingent liabilities below.\n\na) Provisions\nb) Contingent liabilities\nClaims 100";
        let bounds = find_bounds(text);
        assert_eq!(&text[bounds.start..bounds.start + 2], "b)");
    }

    #[test]
    fn stops_at_next_lettered_item() {
        let text = "b) Contingent liabilities\nClaims against the Company not acknowledged 1,200\n\
                    Guarantees 300\nc) Commitments\nCapital commitments 900";
        let section = extract_section(text, 1);
        assert!(section.text.ends_with("Guarantees 300"));
        assert!(!section.text.contains("Commitments\n"));
    }

    #[test]
    fn roman_sub_items_do_not_end_the_section() {
        let text = "b) Contingent liabilities (to the extent not provided for)\n\
                    a) Claims against the Company 1,200\ni) Income tax 300\nTotal 1,500\n42. Related party disclosures";
        let section = extract_section(text, 1);
        assert!(section.text.contains("i) Income tax 300"));
        assert!(section.text.ends_with("Total 1,500"));
    }

    #[test]
    fn stops_at_caps_heading_but_not_total() {
        let text = "Contingent liabilities and commitments of the group\nClaims 1,200\nGRAND TOTAL\n\
                    Guarantees 300\nCAPITAL MANAGEMENT\nThe Group manages capital";
        let section = extract_section(text, 1);
        assert!(section.text.contains("Guarantees 300"));
        assert!(!section.text.contains("CAPITAL MANAGEMENT"));
    }

    #[test]
    fn long_caps_heading_keeps_its_rows() {
        let text = "B) CONTINGENT LIABILITIES AND COMMITMENTS (TO THE EXTENT NOT PROVIDED FOR)\n\
                    Claims against the Company 1,200\nGrand Total 1,200";
        let section = extract_section(text, 1);
        assert!(section.found);
        assert_eq!(section.text, text);
    }

    #[test]
    fn end_search_offset_counts_characters() {
        // "c)" sits 51 bytes but only 35 characters past the start.
        let text = "b) Contingent liabilities ₹₹₹₹₹₹₹₹\nc) Bank guarantees 300\nd) Other items 12345678";
        let section = extract_section(text, 1);
        assert!(section.text.contains("c) Bank guarantees 300"));
        assert!(!section.text.contains("d) Other"));
    }

    #[test]
    fn bounds_always_within_text() {
        let samples = [
            "",
            "contingent liability",
            "b) contingent liabilities",
            "no section here at all",
            "b) Contingent liabilities ₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹₹\nc) Next",
            SCENARIO,
        ];
        for text in samples {
            let b = find_bounds(text);
            assert!(b.start <= b.end, "start > end for {:?}", text);
            assert!(b.end <= text.len(), "end past text for {:?}", text);
        }
    }

    #[test]
    fn missing_start_degrades_to_whole_text() {
        let text = "Provisions for warranties 1,000";
        let bounds = find_bounds(text);
        assert_eq!(bounds, SectionBounds { start: 0, end: text.len(), found: false });
    }

    #[test]
    fn total_line_needs_an_amount() {
        assert!(is_total_line("Grand Total ₹ 10,00,000"));
        assert!(is_total_line("Total 1,500"));
        assert!(is_total_line("Total (Rs. in crore)"));
        assert!(!is_total_line("Total contingent liabilities"));
        assert!(!is_total_line("Claims 1,500"));
    }

    #[test]
    fn fixed_page_reads_configured_page() {
        let backend = MemoryBackend::from_texts(&["Cover", SCENARIO]);
        let section = FixedPageStrategy.extract(&backend, &target(2)).unwrap();
        assert!(section.found);
        assert_eq!(section.pages, vec![2]);
        assert!(section.text.starts_with("b) Contingent Liabilities"));
    }

    #[test]
    fn fixed_page_without_token_returns_full_page() {
        let backend = MemoryBackend::from_texts(&["Statement of cash flows\nOperating 100"]);
        let section = FixedPageStrategy.extract(&backend, &target(1)).unwrap();
        assert!(!section.found);
        assert_eq!(section.text, "Statement of cash flows\nOperating 100");
    }

    #[test]
    fn fixed_page_out_of_range_is_an_error() {
        let backend = MemoryBackend::from_texts(&["only page"]);
        let err = FixedPageStrategy.extract(&backend, &target(7)).unwrap_err();
        assert!(matches!(err, PdfError::PageOutOfRange { page: 7, total: 1 }));
    }

    #[test]
    fn until_total_reads_across_pages_and_columns() {
        let backend = MemoryBackend {
            pages: vec![
                Page::new(1, "Cover page"),
                Page::with_columns(
                    2,
                    "Leases\nThe Group leases offices",
                    "Notes to Consolidated Financial Statements\nb) Contingent liabilities\nClaims against the Company 1,200",
                ),
                Page::with_columns(
                    3,
                    "Bank guarantees 300\nGrand Total 1,500\nc) Commitments",
                    "Segment information",
                ),
                Page::new(4, "Should never be read"),
            ],
        };
        let section = UntilTotalStrategy.extract(&backend, &target(2)).unwrap();
        assert!(section.found);
        assert_eq!(section.pages, vec![2, 3]);
        assert_eq!(
            section.text,
            "b) Contingent liabilities\nClaims against the Company 1,200\nBank guarantees 300\nGrand Total 1,500"
        );
        assert_eq!(section.end, section.text.len());
    }

    #[test]
    fn until_total_is_bounded_by_page_count() {
        let backend = MemoryBackend::from_texts(&[
            "Notes to consolidated financial statements\nb) Contingent liabilities\nClaims 1,200",
            "Guarantees 300",
        ]);
        let section = UntilTotalStrategy.extract(&backend, &target(1)).unwrap();
        assert!(section.found);
        assert_eq!(section.pages, vec![1, 2]);
        assert!(section.text.ends_with("Guarantees 300"));
    }

    #[test]
    fn until_total_without_heading_degrades_to_start_page() {
        let backend = MemoryBackend::from_texts(&["b) Contingent liabilities\nClaims 1,200", "Total 1,200"]);
        let section = UntilTotalStrategy.extract(&backend, &target(1)).unwrap();
        assert!(!section.found);
        assert_eq!(section.pages, vec![1]);
        assert_eq!(section.text, "b) Contingent liabilities\nClaims 1,200");
    }
}
