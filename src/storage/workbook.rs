// src/storage/workbook.rs
use std::collections::HashSet;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::extractors::table::TableResult;
use crate::pipeline::{ExtractionResult, ExtractionSet};
use crate::storage::strip_control_chars;
use crate::utils::error::StorageError;

// --- Constants ---
const MAX_SHEET_NAME: usize = 31;
const MAX_CELL_CHARS: usize = 32_767;
const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Drops control characters a spreadsheet cell can't hold, and truncates to
/// the cell length limit.
pub fn clean_cell(value: &str) -> String {
    strip_control_chars(value).chars().take(MAX_CELL_CHARS).collect()
}

fn sanitize_sheet_name(name: &str) -> String {
    name.chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim_matches('\'')
        .to_string()
}

/// Hands out unique, valid worksheet names.
#[derive(Debug, Default)]
pub struct SheetNamer {
    used: HashSet<String>,
    counter: usize,
}

impl SheetNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a fixed name such as "Summary".
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_lowercase());
    }

    /// `{Section}_Table_{i}`, falling back to `Table_{n}` when that is too
    /// long or already taken. `n` counts every table sheet written.
    pub fn table_sheet(&mut self, section_name: &str, index: usize) -> String {
        self.counter += 1;
        let prefix = if section_name.starts_with("Page_no_") {
            section_name.to_string()
        } else {
            title_word(section_name.split('_').next().unwrap_or(section_name))
        };

        let preferred = sanitize_sheet_name(&format!("{}_Table_{}", prefix, index));
        if preferred.chars().count() <= MAX_SHEET_NAME && self.claim(&preferred) {
            return preferred;
        }

        let mut n = self.counter;
        loop {
            let fallback = format!("Table_{}", n);
            if self.claim(&fallback) {
                return fallback;
            }
            n += 1;
        }
    }

    fn claim(&mut self, name: &str) -> bool {
        !name.is_empty() && self.used.insert(name.to_lowercase())
    }
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn write_header(sheet: &mut Worksheet, headers: &[&str], bold: &Format) -> Result<(), StorageError> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, bold)?;
    }
    Ok(())
}

fn write_summary(sheet: &mut Worksheet, results: &ExtractionSet, bold: &Format) -> Result<(), StorageError> {
    sheet.set_name("Summary")?;
    write_header(
        sheet,
        &["Section", "Page Number", "Logical Page", "Text Extracted", "Number of Tables", "Text Length", "Error"],
        bold,
    )?;

    for (i, result) in results.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, clean_cell(&result.title()))?;
        sheet.write_number(row, 1, result.physical_page as f64)?;
        if let Some(logical) = result.logical_page {
            sheet.write_number(row, 2, f64::from(logical))?;
        }
        sheet.write_string(row, 3, if result.text.is_empty() { "No" } else { "Yes" })?;
        sheet.write_number(row, 4, result.tables.len() as f64)?;
        sheet.write_number(row, 5, result.text.chars().count() as f64)?;
        if let Some(error) = &result.error {
            sheet.write_string(row, 6, clean_cell(error))?;
        }
    }
    sheet.set_column_width(0, 24)?;
    sheet.set_column_width(6, 40)?;
    Ok(())
}

fn write_text(sheet: &mut Worksheet, results: &ExtractionSet, bold: &Format) -> Result<(), StorageError> {
    sheet.set_name("Extracted Text")?;
    write_header(sheet, &["Section", "Page", "Extracted Text"], bold)?;

    for (i, result) in results.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, clean_cell(&result.title()))?;
        sheet.write_number(row, 1, result.physical_page as f64)?;
        sheet.write_string(row, 2, clean_cell(&result.text))?;
    }
    sheet.set_column_width(0, 24)?;
    sheet.set_column_width(2, 100)?;
    Ok(())
}

fn write_table(sheet: &mut Worksheet, name: &str, table: &TableResult, bold: &Format) -> Result<(), StorageError> {
    sheet.set_name(name)?;
    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, clean_cell(header), bold)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        for (col, cell) in row.cells.iter().enumerate() {
            sheet.write_string((r + 1) as u32, col as u16, clean_cell(cell))?;
        }
    }
    if table.columns > 0 {
        sheet.set_column_width(0, 48)?;
    }
    Ok(())
}

/// Writes the Summary sheet, the Extracted Text sheet and one sheet per table.
pub fn write_workbook(results: &ExtractionSet, path: &Path) -> Result<usize, StorageError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    write_summary(workbook.add_worksheet(), results, &bold)?;
    write_text(workbook.add_worksheet(), results, &bold)?;

    let mut namer = SheetNamer::new();
    namer.reserve("Summary");
    namer.reserve("Extracted Text");

    let mut written = 0;
    for result in results.iter() {
        written += write_section_tables(&mut workbook, &mut namer, result, &bold)?;
    }

    workbook.save(path)?;
    tracing::info!("Saved workbook with {} table sheet(s) to {}", written, path.display());
    Ok(written)
}

fn write_section_tables(
    workbook: &mut Workbook,
    namer: &mut SheetNamer,
    result: &ExtractionResult,
    bold: &Format,
) -> Result<usize, StorageError> {
    for (i, table) in result.tables.iter().enumerate() {
        let name = namer.table_sheet(&result.section_name, i + 1);
        tracing::debug!("Writing {:?} table from {} to sheet '{}'", table.source, result.section_name, name);
        write_table(workbook.add_worksheet(), &name, table, bold)?;
    }
    Ok(result.tables.len())
}
