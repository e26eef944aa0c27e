// src/storage/document.rs
use std::fs::File;
use std::path::Path;

use docx_rs::{BreakType, Docx, Paragraph, Run, Style, StyleType, Table, TableCell, TableRow};

use crate::extractors::table::TableResult;
use crate::pipeline::{ExtractionResult, ExtractionSet};
use crate::storage::strip_control_chars;
use crate::utils::error::StorageError;

const DOCUMENT_TITLE: &str = "Contingent Liabilities Data";
const NO_TEXT: &str = "No text was extracted for this section.";

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(strip_control_chars(text)))
}

fn styled(text: &str, style: &str) -> Paragraph {
    text_paragraph(text).style(style)
}

fn page_break() -> Paragraph {
    Paragraph::new().add_run(Run::new().add_break(BreakType::Page))
}

fn cell(text: &str, bold: bool) -> TableCell {
    let run = Run::new().add_text(strip_control_chars(text));
    TableCell::new().add_paragraph(Paragraph::new().add_run(if bold { run.bold() } else { run }))
}

fn native_table(table: &TableResult) -> Table {
    let mut rows = vec![TableRow::new(table.headers.iter().map(|h| cell(h, true)).collect())];
    rows.extend(
        table
            .rows
            .iter()
            .map(|row| TableRow::new(row.cells.iter().map(|c| cell(c, false)).collect())),
    );
    Table::new(rows)
}

fn add_section(mut docx: Docx, result: &ExtractionResult) -> Docx {
    docx = docx
        .add_paragraph(styled(&result.title(), "Heading1"))
        .add_paragraph(text_paragraph(&result.provenance()));

    if let Some(error) = &result.error {
        docx = docx.add_paragraph(text_paragraph(&format!("Extraction error: {}", error)));
    }

    if result.text.trim().is_empty() {
        return docx.add_paragraph(text_paragraph(NO_TEXT));
    }

    // One paragraph per line; runs don't carry line breaks.
    for line in result.text.lines() {
        docx = docx.add_paragraph(text_paragraph(line));
    }

    for (i, table) in result.tables.iter().enumerate() {
        docx = docx
            .add_paragraph(styled(&format!("Table {}", i + 1), "Heading2"))
            .add_table(native_table(table));
    }
    docx
}

/// Builds the report: title, then one block per section with page breaks between.
pub fn build_document(results: &ExtractionSet) -> Docx {
    let mut docx = Docx::new()
        .add_style(Style::new("Title", StyleType::Paragraph).name("Title").size(48).bold())
        .add_style(Style::new("Heading1", StyleType::Paragraph).name("Heading 1").size(32).bold())
        .add_style(Style::new("Heading2", StyleType::Paragraph).name("Heading 2").size(26).bold())
        .add_paragraph(styled(DOCUMENT_TITLE, "Title"));

    let last = results.len().saturating_sub(1);
    for (i, result) in results.iter().enumerate() {
        docx = add_section(docx, result);
        if i < last {
            docx = docx.add_paragraph(page_break());
        }
    }
    docx
}

pub fn write_document(results: &ExtractionSet, path: &Path) -> Result<(), StorageError> {
    let file = File::create(path)?;
    build_document(results)
        .build()
        .pack(file)
        .map_err(|e| StorageError::Document(format!("{}: {}", path.display(), e)))?;
    tracing::info!("Saved Word document to {}", path.display());
    Ok(())
}
