// src/extractors/table.rs
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::pdf::StructureRecognizer;
use crate::utils::error::ExtractError;

// --- Constants ---
const MIN_LINE_CHARS: usize = 10;
const MAX_LINE_CHARS: usize = 200;
// Column counts outside this range make the two-space split suspicious.
const MIN_PLAUSIBLE_COLUMNS: usize = 2;
const MAX_PLAUSIBLE_COLUMNS: usize = 6;

/// Vocabulary of contingent-liability disclosures, used for keyword scoring.
pub const CONTINGENT_KEYWORDS: &[&str] = &[
    "contingent liabilit",
    "guarantee",
    "claims",
    "litigation",
    "disputed",
    "not acknowledged as debt",
    "pending cases",
    "bonds",
    "letters of credit",
    "letter of credit",
    "legal proceedings",
    "tax disputes",
    "unascertained",
    "arbitration",
    "court cases",
    "surety",
    "indemnit",
    "commitments",
    "possible obligations",
];

// --- Regex Patterns ---
static MULTISPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}|\t").expect("Failed to compile MULTISPACE_RE"));

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[₹$€£]|\brs\.|\binr\b|\bcrores?\b|\blakhs?\b").expect("Failed to compile CURRENCY_RE")
});

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("Failed to compile NUMERIC_RE"));

// Column headers, unit captions and page furniture.
static NOISE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^\s*(?:particulars|sr\.?\s*no\.?|s\.\s*no\.?|note\s+no\.?|description)\b",
        r"(?i)^\s*(?:as\s+at|as\s+on|for\s+the\s+year|year\s+ended)\b",
        r"(?i)^\s*\(?\s*(?:amount\s+)?(?:in\s+)?(?:₹|rs\.?|inr)\s*(?:in\s+)?(?:crores?|lakhs?|millions?|thousands?)\s*\)?\s*$",
        r"(?i)^\s*(?:\d{1,2}(?:st|nd|rd|th)?\s+)?(?:january|february|march|april|may|june|july|august|september|october|november|december)\s*,?\s*\d{4}\b",
        r"(?i)^\s*page\s+\d+\s*$",
        r"(?i)annual\s+report\s+\d{4}",
    ]
    .iter()
    .filter_map(|pat| Regex::new(pat).ok())
    .collect()
});

const AMOUNT_TOKEN: &str = r"(?:(?:₹|\$|(?i:rs\.?|inr))\s?)?\(?-?\d[\d,]*(?:\.\d+)?\)?";

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(AMOUNT_TOKEN).expect("Failed to compile AMOUNT_RE"));

static TRAILING_AMOUNTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:(?:^|\s+){})+\s*$", AMOUNT_TOKEN)).expect("Failed to compile TRAILING_AMOUNTS_RE")
});

static MD_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:?-{3,}:?$").expect("Failed to compile MD_SEPARATOR_RE"));

// --- Data Structures ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    /// Rebuilt from section text with whitespace/amount heuristics.
    Text,
    /// Parsed from the structure recognizer's markdown.
    Structure,
    /// Rows returned by the model.
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRow {
    pub cells: Vec<String>,
}

impl CandidateRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn non_empty_cells(&self) -> usize {
        self.cells.iter().filter(|c| !c.trim().is_empty()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableResult {
    pub rows: Vec<CandidateRow>,
    pub columns: usize,
    pub headers: Vec<String>,
    pub source: TableSource,
    pub page: Option<usize>,
}

/// Positional column names for a text-derived table.
pub fn column_names(columns: usize) -> Vec<String> {
    let named: &[&str] = match columns {
        2 => &["Description", "Amount"],
        3 => &["Description", "Current Year", "Previous Year"],
        4 => &["Description", "Current Year", "Previous Year", "Notes"],
        _ => &[],
    };
    if named.is_empty() {
        (1..=columns).map(|i| format!("Column {}", i)).collect()
    } else {
        named.iter().map(|s| s.to_string()).collect()
    }
}

impl TableResult {
    /// Builds a table from raw cell rows: trims cells, drops empty rows, pads
    /// to the widest row and names the columns. Returns `None` unless at least
    /// one row has two or more non-empty cells.
    pub fn from_rows(
        rows: Vec<Vec<String>>,
        headers: Option<Vec<String>>,
        source: TableSource,
        page: Option<usize>,
    ) -> Option<Self> {
        let mut rows: Vec<CandidateRow> = rows
            .into_iter()
            .map(|cells| CandidateRow::new(cells.into_iter().map(|c| c.trim().to_string()).collect()))
            .filter(|row| row.non_empty_cells() > 0)
            .collect();

        if !rows.iter().any(|row| row.non_empty_cells() >= 2) {
            return None;
        }

        let header_width = headers.as_ref().map_or(0, Vec::len);
        let columns = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0).max(header_width);
        for row in &mut rows {
            row.cells.resize(columns, String::new());
        }

        let positional = column_names(columns);
        let headers = match headers {
            Some(given) => (0..columns)
                .map(|i| {
                    given
                        .get(i)
                        .map(|h| h.trim().to_string())
                        .filter(|h| !h.is_empty())
                        .unwrap_or_else(|| format!("Column {}", i + 1))
                })
                .collect(),
            None => positional,
        };

        Some(Self { rows, columns, headers, source, page })
    }

    /// Markdown rendering, the format the model sees.
    pub fn to_markdown(&self) -> String {
        let escape = |s: &str| s.replace('|', "\\|");
        let mut out = format!("| {} |\n", self.headers.iter().map(|h| escape(h)).collect::<Vec<_>>().join(" | "));
        out.push_str(&format!("|{}\n", "---|".repeat(self.columns)));
        for row in &self.rows {
            out.push_str(&format!("| {} |\n", row.cells.iter().map(|c| escape(c)).collect::<Vec<_>>().join(" | ")));
        }
        out
    }

    /// Number of distinct contingent-liability keywords in headers and cells.
    pub fn keyword_score(&self) -> usize {
        let mut haystack = self.headers.join(" ").to_lowercase();
        for row in &self.rows {
            haystack.push(' ');
            haystack.push_str(&row.cells.join(" ").to_lowercase());
        }
        CONTINGENT_KEYWORDS.iter().filter(|k| haystack.contains(*k)).count()
    }
}

// --- Text heuristics ---

fn is_noise(line: &str) -> bool {
    NOISE_RES.iter().any(|re| re.is_match(line))
}

/// A line that may be a table row: reasonable length, carries an amount
/// (currency, crore/lakh, or a number) and is not a header or caption.
pub fn is_tabular_line(line: &str) -> bool {
    let trimmed = line.trim();
    let len = trimmed.chars().count();
    if !(MIN_LINE_CHARS..=MAX_LINE_CHARS).contains(&len) {
        return false;
    }
    let has_amount = CURRENCY_RE.is_match(trimmed) || NUMERIC_RE.is_match(trimmed);
    has_amount && !is_noise(trimmed)
}

/// Splits description text from the run of amounts that ends the line.
fn split_trailing_amounts(line: &str) -> Option<Vec<String>> {
    let m = TRAILING_AMOUNTS_RE.find(line)?;
    let description = line[..m.start()].trim();
    let mut cells = Vec::new();
    if !description.is_empty() {
        cells.push(description.to_string());
    }
    cells.extend(AMOUNT_RE.find_iter(m.as_str()).map(|a| a.as_str().trim().to_string()));
    Some(cells)
}

/// Cells of one tabular line.
pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let primary: Vec<String> = MULTISPACE_RE
        .split(trimmed)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();

    if (MIN_PLAUSIBLE_COLUMNS..=MAX_PLAUSIBLE_COLUMNS).contains(&primary.len()) {
        return primary;
    }

    match split_trailing_amounts(trimmed) {
        Some(cells) if cells.len() >= MIN_PLAUSIBLE_COLUMNS => {
            tracing::trace!("Amount split used for '{}' ({} cells)", trimmed, cells.len());
            cells
        }
        _ => primary,
    }
}

/// Rebuilds a table from section text.
pub fn table_from_text(text: &str, page: Option<usize>) -> Option<TableResult> {
    let rows: Vec<Vec<String>> = text.lines().filter(|l| is_tabular_line(l)).map(split_cells).collect();
    tracing::debug!("{} candidate row(s) in {} line(s)", rows.len(), text.lines().count());
    TableResult::from_rows(rows, None, TableSource::Text, page)
}

fn split_markdown_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty() && cells.iter().all(|c| MD_SEPARATOR_RE.is_match(c.trim()))
}

/// Every pipe table in a markdown document.
pub fn parse_markdown_tables(markdown: &str, page: Option<usize>) -> Vec<TableResult> {
    let mut blocks: Vec<Vec<Vec<String>>> = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in markdown.lines() {
        if line.trim_start().starts_with('|') {
            current.push(split_markdown_row(line));
        } else if !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
        .into_iter()
        .filter_map(|block| {
            let has_header = block.len() > 1 && is_separator_row(&block[1]);
            let mut rows = block.into_iter();
            // Header-less tables get generic names rather than positional ones.
            let headers = if has_header { rows.next() } else { Some(Vec::new()) };
            let body: Vec<Vec<String>> = rows.filter(|r| !is_separator_row(r)).collect();
            TableResult::from_rows(body, headers, TableSource::Structure, page)
        })
        .collect()
}

// --- Strategies ---

/// What the table strategies work from.
pub struct TableInput<'a> {
    pub text: &'a str,
    pub pdf: &'a Path,
    pub pages: &'a [usize],
}

pub trait TableStrategy {
    fn name(&self) -> &str;
    fn extract(&self, input: &TableInput<'_>) -> Result<Vec<TableResult>, ExtractError>;
}

/// Whitespace and amount-boundary reconstruction from text.
pub struct TextTableStrategy;

impl TableStrategy for TextTableStrategy {
    fn name(&self) -> &str {
        "text"
    }

    fn extract(&self, input: &TableInput<'_>) -> Result<Vec<TableResult>, ExtractError> {
        Ok(table_from_text(input.text, input.pages.first().copied()).into_iter().collect())
    }
}

/// Tables recognized by an external structure model, page by page.
pub struct StructureTableStrategy {
    recognizer: Box<dyn StructureRecognizer>,
}

impl StructureTableStrategy {
    pub fn new(recognizer: Box<dyn StructureRecognizer>) -> Self {
        Self { recognizer }
    }
}

impl TableStrategy for StructureTableStrategy {
    fn name(&self) -> &str {
        "structure"
    }

    fn extract(&self, input: &TableInput<'_>) -> Result<Vec<TableResult>, ExtractError> {
        let mut tables = Vec::new();
        for &page in input.pages {
            let markdown = self.recognizer.page_markdown(input.pdf, page).map_err(|e| ExtractError::Table {
                strategy: self.recognizer.name().to_string(),
                reason: e.to_string(),
            })?;
            let parsed = parse_markdown_tables(&markdown, Some(page));
            tracing::debug!("{}: {} table(s) on page {}", self.recognizer.name(), parsed.len(), page);
            tables.extend(parsed);
        }
        Ok(tables)
    }
}

/// Runs every strategy and keeps all their tables side by side. A failing
/// strategy is logged and skipped.
pub fn reconstruct_tables(strategies: &[Box<dyn TableStrategy>], input: &TableInput<'_>) -> Vec<TableResult> {
    let mut tables = Vec::new();
    for strategy in strategies {
        match strategy.extract(input) {
            Ok(found) => {
                tracing::info!("Table strategy '{}' produced {} table(s)", strategy.name(), found.len());
                tables.extend(found);
            }
            Err(e) => tracing::warn!("Table strategy '{}' failed: {}", strategy.name(), e),
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::PdfError;

    fn cells(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scenario_rows_under_description_amount() {
        let text = "b) Contingent Liabilities\nClaims against company ₹ 10,00,000\nGrand Total ₹ 10,00,000";
        let table = table_from_text(text, Some(1)).expect("table retained");
        assert_eq!(table.headers, cells(&["Description", "Amount"]));
        assert_eq!(table.columns, 2);
        assert_eq!(
            table.rows,
            vec![
                CandidateRow::new(cells(&["Claims against company", "₹ 10,00,000"])),
                CandidateRow::new(cells(&["Grand Total", "₹ 10,00,000"])),
            ]
        );
    }

    #[test]
    fn lines_without_amounts_are_never_rows() {
        assert!(!is_tabular_line("Claims against the company not acknowledged as debt"));
        assert!(!is_tabular_line("b) Contingent Liabilities"));
        assert!(is_tabular_line("Bank guarantees  1,200"));
        assert!(is_tabular_line("Guarantees given in crore"));
    }

    #[test]
    fn length_and_noise_filters() {
        assert!(!is_tabular_line("Total 5"));
        assert!(!is_tabular_line(&format!("Claims {}", "9".repeat(250))));
        assert!(!is_tabular_line("Particulars   31 March 2024   31 March 2023"));
        assert!(!is_tabular_line("(₹ in Crore)"));
        assert!(!is_tabular_line("As at 31 March 2024"));
        assert!(!is_tabular_line("Page 346"));
    }

    #[test]
    fn two_space_split_is_primary() {
        assert_eq!(
            split_cells("  Income tax demands   1,234.56   987.00 "),
            cells(&["Income tax demands", "1,234.56", "987.00"])
        );
    }

    #[test]
    fn amount_split_when_primary_is_implausible() {
        assert_eq!(
            split_cells("Claims under section 143(3) Rs. 5,000 (2,000)"),
            cells(&["Claims under section 143(3)", "Rs. 5,000", "(2,000)"])
        );
        assert_eq!(split_cells("Guarantees 300"), cells(&["Guarantees", "300"]));
    }

    #[test]
    fn rows_are_padded_to_widest() {
        let text = "Claims against the company   1,200   1,100   Note 4\nGuarantees  300";
        let table = table_from_text(text, None).unwrap();
        assert_eq!(table.columns, 4);
        assert_eq!(table.headers, cells(&["Description", "Current Year", "Previous Year", "Notes"]));
        for row in &table.rows {
            assert_eq!(row.cells.len(), table.columns);
        }
        assert_eq!(table.rows[1].cells, cells(&["Guarantees", "300", "", ""]));
    }

    #[test]
    fn generic_names_beyond_four_columns() {
        assert_eq!(column_names(5)[4], "Column 5");
        assert_eq!(column_names(1), cells(&["Column 1"]));
    }

    #[test]
    fn table_needs_a_row_with_two_cells() {
        assert!(TableResult::from_rows(vec![cells(&["only", " "]), cells(&["", ""])], None, TableSource::Text, None).is_none());
        let kept = TableResult::from_rows(
            vec![cells(&["  ", "   "]), cells(&["a", "1"])],
            None,
            TableSource::Text,
            None,
        )
        .unwrap();
        assert_eq!(kept.rows.len(), 1);
    }

    #[test]
    fn parses_pipe_tables_with_headers() {
        let md = "## Note 38\n\n| Particulars | 2024 | 2023 |\n|---|---:|---:|\n\
                  | Claims not acknowledged as debt | 1,200 | 1,100 |\n| Bank guarantees | 300 | |\n\n\
                  Some text\n\n| a | b |\n| 1 | 2 |\n";
        let tables = parse_markdown_tables(md, Some(7));
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].headers, cells(&["Particulars", "2024", "2023"]));
        assert_eq!(tables[0].rows[1].cells, cells(&["Bank guarantees", "300", ""]));
        assert_eq!(tables[0].source, TableSource::Structure);
        assert_eq!(tables[0].page, Some(7));
        assert_eq!(tables[1].headers, cells(&["Column 1", "Column 2"]));
        assert_eq!(tables[1].rows.len(), 2);
    }

    #[test]
    fn escaped_pipes_stay_in_cell() {
        assert_eq!(split_markdown_row(r"| a \| b | c |"), cells(&["a | b", "c"]));
    }

    #[test]
    fn keyword_score_counts_distinct_terms() {
        let table = TableResult::from_rows(
            vec![
                cells(&["Claims against the company not acknowledged as debt", "1,200"]),
                cells(&["Bank guarantees", "300"]),
                cells(&["Other claims", "5"]),
            ],
            None,
            TableSource::Text,
            None,
        )
        .unwrap();
        assert_eq!(table.keyword_score(), 3);
    }

    #[test]
    fn markdown_rendering() {
        let table = TableResult::from_rows(vec![cells(&["Claims", "1"])], None, TableSource::Text, None).unwrap();
        assert_eq!(table.to_markdown(), "| Description | Amount |\n|---|---|\n| Claims | 1 |\n");
    }

    struct FailingRecognizer;

    impl StructureRecognizer for FailingRecognizer {
        fn name(&self) -> &str {
            "docling"
        }
        fn page_markdown(&self, _pdf: &Path, _page: usize) -> Result<String, PdfError> {
            Err(PdfError::Tool { tool: "docling".into(), reason: "not installed".into() })
        }
    }

    struct FixedRecognizer(&'static str);

    impl StructureRecognizer for FixedRecognizer {
        fn name(&self) -> &str {
            "fixed"
        }
        fn page_markdown(&self, _pdf: &Path, _page: usize) -> Result<String, PdfError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn failing_strategy_leaves_text_tables() {
        let strategies: Vec<Box<dyn TableStrategy>> = vec![
            Box::new(TextTableStrategy),
            Box::new(StructureTableStrategy::new(Box::new(FailingRecognizer))),
        ];
        let input = TableInput { text: "Claims against company ₹ 10,00,000", pdf: Path::new("x.pdf"), pages: &[3] };
        let tables = reconstruct_tables(&strategies, &input);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].source, TableSource::Text);
        assert_eq!(tables[0].page, Some(3));
    }

    #[test]
    fn strategies_are_unioned_not_deduplicated() {
        let strategies: Vec<Box<dyn TableStrategy>> = vec![
            Box::new(TextTableStrategy),
            Box::new(StructureTableStrategy::new(Box::new(FixedRecognizer(
                "| Claims against company | ₹ 10,00,000 |\n",
            )))),
        ];
        let input = TableInput { text: "Claims against company ₹ 10,00,000", pdf: Path::new("x.pdf"), pages: &[3] };
        let tables = reconstruct_tables(&strategies, &input);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows, tables[1].rows);
        assert_ne!(tables[0].source, tables[1].source);
    }
}
