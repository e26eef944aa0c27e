// src/pdf/page.rs

// Share of long lines that must be blank at the gutter for a two-column layout.
const GUTTER_BLANK_RATIO: f64 = 0.95;
// Share of lines whose right half must carry words.
const RIGHT_PROSE_RATIO: f64 = 0.3;
const MIN_LINES_FOR_COLUMNS: usize = 4;

/// One physical page of the PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Physical page number, 1-based.
    pub number: usize,
    pub text: String,
    /// Geometry-based split supplied by the backend, if any.
    split: Option<Columns>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Columns {
    pub left: String,
    pub right: String,
}

impl Page {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self { number, text: text.into(), split: None }
    }

    /// A page whose halves were already cut by page geometry.
    pub fn with_columns(number: usize, left: impl Into<String>, right: impl Into<String>) -> Self {
        let left = left.into();
        let right = right.into();
        Self {
            number,
            text: format!("{}\n{}", left, right),
            split: Some(Columns { left, right }),
        }
    }

    /// Left/right halves, either as supplied or inferred from a whitespace
    /// gutter in layout text. `None` for single-column pages.
    pub fn columns(&self) -> Option<Columns> {
        if let Some(split) = &self.split {
            return Some(split.clone());
        }
        split_on_gutter(&self.text)
    }

    /// Columns in reading order (left, then right), or the whole page.
    pub fn reading_order(&self) -> Vec<(&'static str, String)> {
        match self.columns() {
            Some(cols) => vec![("LEFT", cols.left), ("RIGHT", cols.right)],
            None => vec![("PAGE", self.text.clone())],
        }
    }
}

/// Finds a gutter column near the horizontal midpoint and cuts every line there.
fn split_on_gutter(text: &str) -> Option<Columns> {
    let lines: Vec<Vec<char>> = text.lines().map(|l| l.chars().collect()).collect();
    let width = lines.iter().map(Vec::len).max().unwrap_or(0);
    let non_empty = lines.iter().filter(|l| l.iter().any(|c| !c.is_whitespace())).count();
    if width < 20 || non_empty < MIN_LINES_FOR_COLUMNS {
        return None;
    }

    let blank_at = |line: &Vec<char>, col: usize| line.get(col).map_or(true, |c| c.is_whitespace());

    // Pick the candidate column blank in the most lines, preferring the centre.
    let lo = width * 3 / 8;
    let hi = width * 5 / 8;
    let mid = width / 2;
    let mut best: Option<(usize, usize)> = None;
    for col in lo..=hi {
        let blanks = lines.iter().filter(|l| blank_at(l, col)).count();
        let better = match best {
            None => true,
            Some((b_col, b_blanks)) => {
                blanks > b_blanks || (blanks == b_blanks && col.abs_diff(mid) < b_col.abs_diff(mid))
            }
        };
        if better {
            best = Some((col, blanks));
        }
    }
    let (gutter, _) = best?;

    let long_lines: Vec<&Vec<char>> = lines.iter().filter(|l| l.len() > gutter).collect();
    if long_lines.is_empty() {
        return None;
    }
    let blank_long = long_lines.iter().filter(|l| blank_at(l, gutter)).count();
    if (blank_long as f64) < GUTTER_BLANK_RATIO * long_lines.len() as f64 {
        return None;
    }

    let prose_right = long_lines
        .iter()
        .filter(|l| {
            let right: String = l[gutter..].iter().collect();
            right
                .split_whitespace()
                .filter(|w| w.chars().filter(|c| c.is_alphabetic()).count() >= 2)
                .count()
                >= 2
        })
        .count();
    if (prose_right as f64) < RIGHT_PROSE_RATIO * non_empty as f64 {
        return None;
    }

    let mut left = Vec::with_capacity(lines.len());
    let mut right = Vec::with_capacity(lines.len());
    for line in &lines {
        let cut = gutter.min(line.len());
        let l: String = line[..cut].iter().collect();
        let r: String = line[cut..].iter().collect();
        left.push(l.trim_end().to_string());
        right.push(r.trim().to_string());
    }

    Some(Columns {
        left: join_trimmed(left),
        right: join_trimmed(right),
    })
}

fn join_trimmed(lines: Vec<String>) -> String {
    lines.join("\n").trim_matches('\n').to_string()
}
