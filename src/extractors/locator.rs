// src/extractors/locator.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::pdf::Page;

/// Subsection token; any whitespace run may separate the words.
pub const SUBSECTION_TOKEN: &str = "contingent liabilit";

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| phrase_regex(SUBSECTION_TOKEN));

static PREFILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bcontingent\s+liabilit(?:y|ies)\b").expect("Failed to compile PREFILTER_RE")
});

/// Case-insensitive pattern for a phrase, tolerant of line breaks between words.
pub fn phrase_regex(phrase: &str) -> Regex {
    let body = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    Regex::new(&format!("(?i){}", body)).expect("escaped phrase is a valid pattern")
}

/// Heading phrase for a section name such as `consolidated` or `standalone_page`.
pub fn heading_for(section_name: &str) -> String {
    let kind = if section_name.to_lowercase().contains("standalone") {
        "standalone"
    } else {
        "consolidated"
    };
    format!("notes to {} financial statement", kind)
}

/// Picks the text of the page (or column) holding the section.
///
/// Preference order: a column with both the heading and the subsection token,
/// a column with the token alone, then both columns together. Returns an empty
/// string when the token appears nowhere.
pub fn locate(page: &Page, heading: &str) -> String {
    let heading_re = phrase_regex(heading);
    let blocks = page.reading_order();

    if let Some((label, text)) = blocks
        .iter()
        .find(|(_, text)| heading_re.is_match(text) && TOKEN_RE.is_match(text))
    {
        tracing::debug!("Page {}: heading and token in {} block", page.number, label);
        return text.clone();
    }

    if let Some((label, text)) = blocks
        .iter()
        .find(|(_, text)| TOKEN_RE.is_match(text))
    {
        tracing::debug!("Page {}: token only in {} block", page.number, label);
        return text.clone();
    }

    let joined = blocks
        .iter()
        .map(|(_, text)| text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if TOKEN_RE.is_match(&joined) {
        tracing::debug!("Page {}: token found across columns", page.number);
        return joined;
    }

    tracing::debug!("Page {}: no '{}' found", page.number, SUBSECTION_TOKEN);
    String::new()
}

/// True when the page mentions contingent liabilities at all.
pub fn mentions_contingent_liabilities(text: &str) -> bool {
    PREFILTER_RE.is_match(text)
}

/// Pages worth sending to the model.
pub fn keyword_prefilter(pages: &[Page]) -> Vec<&Page> {
    pages.iter().filter(|p| mentions_contingent_liabilities(&p.text)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_follows_section_name() {
        assert_eq!(heading_for("consolidated_page"), "notes to consolidated financial statement");
        assert_eq!(heading_for("Standalone"), "notes to standalone financial statement");
    }

    #[test]
    fn prefers_column_with_heading_and_token() {
        let page = Page::with_columns(
            5,
            "Contingent liabilities of joint ventures are disclosed separately",
            "NOTES TO CONSOLIDATED FINANCIAL STATEMENTS\nb) Contingent liabilities\nClaims 1,000",
        );
        let located = locate(&page, &heading_for("consolidated"));
        assert_eq!(
            located,
            "NOTES TO CONSOLIDATED FINANCIAL STATEMENTS\nb) Contingent liabilities\nClaims 1,000"
        );
    }

    #[test]
    fn falls_back_to_token_only_column() {
        let page = Page::with_columns(5, "Leases and rentals", "b) Contingent Liabilities\nClaims 1,000");
        let located = locate(&page, &heading_for("standalone"));
        assert_eq!(located, "b) Contingent Liabilities\nClaims 1,000");
    }

    #[test]
    fn token_split_across_columns_uses_both() {
        let page = Page::with_columns(5, "b) Contingent", "liabilities\nClaims 1,000");
        assert_eq!(
            locate(&page, "notes to consolidated financial statement"),
            "b) Contingent\nliabilities\nClaims 1,000"
        );
    }

    #[test]
    fn no_token_yields_empty() {
        let page = Page::with_columns(5, "Other matters", "Note 41");
        assert_eq!(locate(&page, "notes to consolidated financial statement"), "");
    }

    #[test]
    fn single_column_page_is_used_whole() {
        let text = "b) Contingent Liabilities\nClaims against company ₹ 10,00,000";
        let page = Page::new(1, text);
        assert_eq!(locate(&page, &heading_for("consolidated")), text);
    }

    #[test]
    fn prefilter_matches_singular_and_plural() {
        let pages = vec![
            Page::new(1, "Contingent Liability"),
            Page::new(2, "Contingent   liabilities and commitments"),
            Page::new(3, "Provisions"),
            Page::new(4, "noncontingent liabilityish"),
        ];
        let hits: Vec<usize> = keyword_prefilter(&pages).iter().map(|p| p.number).collect();
        assert_eq!(hits, vec![1, 2]);
    }
}
