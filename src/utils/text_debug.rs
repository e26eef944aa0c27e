// src/utils/text_debug.rs
use std::fs;
use std::path::Path;
use regex::Regex;
use crate::utils::error::AppError;

/// Wraps each highlighted span as `[[label>>...<<label]]`.
/// Overlapping spans are dropped; the earliest span wins.
pub fn annotate(text: &str, highlights: &[(usize, usize, &str)]) -> String {
    let mut sorted = highlights.to_vec();
    sorted.sort_by_key(|h| (h.0, std::cmp::Reverse(h.1)));

    let mut out = String::with_capacity(text.len() + highlights.len() * 16);
    let mut last_pos = 0;

    for (start, end, label) in sorted {
        if start < last_pos || end > text.len() || start > end {
            continue;
        }
        out.push_str(&text[last_pos..start]);
        out.push_str(&format!("[[{}>>", label));
        out.push_str(&text[start..end]);
        out.push_str(&format!("<<{}]]", label));
        last_pos = end;
    }

    out.push_str(&text[last_pos..]);
    out
}

/// Saves a debug copy of `text` with every match of the labelled patterns marked.
pub fn save_annotated_text(text: &str, path: &Path, patterns: &[(&str, &str)]) -> Result<(), AppError> {
    let mut highlights = Vec::new();

    for (pattern, label) in patterns {
        let re = Regex::new(pattern).map_err(|e| {
            AppError::Config(format!("Invalid regex pattern '{}': {}", pattern, e))
        })?;
        for mat in re.find_iter(text) {
            highlights.push((mat.start(), mat.end(), *label));
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, annotate(text, &highlights))?;

    tracing::info!("Saved annotated debug text to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_spans_in_order() {
        let text = "a) Provisions\nb) Contingent liabilities\nTotal 10";
        let marked = annotate(text, &[(40, 45, "total"), (14, 39, "start")]);
        assert_eq!(
            marked,
            "a) Provisions\n[[start>>b) Contingent liabilities<<start]]\n[[total>>Total<<total]] 10"
        );
    }

    #[test]
    fn overlapping_span_is_skipped() {
        let marked = annotate("contingent liability", &[(0, 20, "start"), (11, 20, "token")]);
        assert_eq!(marked, "[[start>>contingent liability<<start]]");
    }
}
