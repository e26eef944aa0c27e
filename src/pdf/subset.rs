// src/pdf/subset.rs
use std::collections::BTreeSet;
use std::path::Path;

use lopdf::Document;

use crate::utils::error::PdfError;

/// Writes a copy of `source` that keeps only `keep` (physical, 1-based) pages.
pub fn write_page_subset(source: &Path, keep: &[usize], target: &Path) -> Result<usize, PdfError> {
    let mut doc = Document::load(source).map_err(|e| PdfError::Open {
        path: source.display().to_string(),
        reason: e.to_string(),
    })?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    let total = page_numbers.len();
    for &page in keep {
        if page == 0 || page > total {
            return Err(PdfError::PageOutOfRange { page, total });
        }
    }

    let drop = pages_to_drop(&page_numbers, keep);
    doc.delete_pages(&drop);
    doc.prune_objects();
    doc.save(target).map_err(|e| PdfError::Write(e.to_string()))?;

    let kept = total - drop.len();
    tracing::info!("Wrote {} page(s) of {} to {}", kept, source.display(), target.display());
    Ok(kept)
}

/// Page numbers (as stored in the page tree) that are not in `keep`.
fn pages_to_drop(page_numbers: &[u32], keep: &[usize]) -> Vec<u32> {
    let keep: BTreeSet<usize> = keep.iter().copied().collect();
    page_numbers
        .iter()
        .enumerate()
        .filter(|(i, _)| !keep.contains(&(i + 1)))
        .map(|(_, n)| *n)
        .collect()
}
