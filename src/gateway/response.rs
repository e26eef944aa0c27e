// src/gateway/response.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

// --- Regex Patterns ---
static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("Failed to compile FENCE_RE"));

static OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("Failed to compile OBJECT_RE"));

static ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("Failed to compile ARRAY_RE"));

// Leading word of a free-text answer, e.g. "True." or "**False**".
static FLAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\W*(true|false|yes|no)\b").expect("Failed to compile FLAG_RE"));

// --- Data Structures ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relevance {
    Relevant,
    NotRelevant,
    /// The model answered, but not in a shape we could read.
    Unparseable,
}

impl Relevance {
    pub fn is_relevant(self) -> bool {
        self == Relevance::Relevant
    }

    /// Reads a relevance label. "Non Relevant" is checked first since it
    /// contains "relevant".
    pub fn from_label(label: &str) -> Self {
        let norm = label.trim().to_lowercase().replace(['-', '_'], " ");
        if norm.starts_with("non") || norm.starts_with("not") || norm.starts_with("irrelevant") {
            Relevance::NotRelevant
        } else if norm.starts_with("relevant") {
            Relevance::Relevant
        } else {
            Relevance::Unparseable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageVerdict {
    pub relevance: Relevance,
    pub confidence: f64,
}

impl Default for PageVerdict {
    /// What a page gets when the model output can't be read.
    fn default() -> Self {
        Self { relevance: Relevance::Unparseable, confidence: 0.0 }
    }
}

impl PageVerdict {
    pub fn not_relevant() -> Self {
        Self { relevance: Relevance::NotRelevant, confidence: 0.0 }
    }

    pub fn passes(&self, threshold: f64) -> bool {
        self.relevance.is_relevant() && self.confidence >= threshold
    }
}

// --- Parsing ---

fn parse_value(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate.trim()).ok()
}

/// Pulls a JSON value out of model output: code fences are unwrapped, then a
/// direct parse is tried, then the widest `{...}` or `[...]` span.
pub fn lenient_json(output: &str) -> Option<Value> {
    let body = FENCE_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .map_or(output, |m| m.as_str());

    if let Some(v) = parse_value(body) {
        return Some(v);
    }

    let object = OBJECT_RE.find(body).map(|m| m.as_str());
    let array = ARRAY_RE.find(body).map(|m| m.as_str());
    // Try whichever span opens first, so an array of objects isn't cut to its first object.
    let mut spans: Vec<&str> = object.into_iter().chain(array).collect();
    spans.sort_by_key(|s| body.find(s).unwrap_or(usize::MAX));
    spans.into_iter().find_map(parse_value)
}

fn confidence_of(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().map_or(0.0, |c| {
            if c > 1.0 {
                c / 100.0
            } else {
                c
            }
        }),
        _ => 0.0,
    }
}

/// Reads a page classification. Anything unreadable yields the default verdict.
pub fn parse_verdict(output: &str) -> PageVerdict {
    let Some(Value::Object(map)) = lenient_json(output) else {
        tracing::warn!("Could not parse a verdict from model output: {:?}", preview(output));
        return PageVerdict::default();
    };

    let relevance = map
        .get("relevance")
        .and_then(Value::as_str)
        .map_or(Relevance::Unparseable, Relevance::from_label);
    let confidence = map.get("confidence").map_or(0.0, confidence_of).clamp(0.0, 1.0);

    PageVerdict { relevance, confidence }
}

/// Normalizes a free-text True/False answer.
pub fn parse_flag(output: &str) -> Relevance {
    match FLAG_RE.captures(output).and_then(|c| c.get(1)) {
        Some(m) => match m.as_str().to_lowercase().as_str() {
            "true" | "yes" => Relevance::Relevant,
            _ => Relevance::NotRelevant,
        },
        None => {
            tracing::warn!("Model flag is neither True nor False: {:?}", preview(output));
            Relevance::Unparseable
        }
    }
}

/// Rows of an extracted table: a JSON array of row objects, or an object
/// wrapping one. Headers are the row keys in first-seen order.
pub fn parse_rows(output: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let value = lenient_json(output)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().find_map(|(_, v)| match v {
            Value::Array(items) => Some(items),
            _ => None,
        })?,
        _ => return None,
    };

    let mut headers: Vec<String> = Vec::new();
    let objects: Vec<serde_json::Map<String, Value>> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
    for row in &objects {
        for key in row.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows: Vec<Vec<String>> = objects
        .iter()
        .map(|row| headers.iter().map(|h| row.get(h).map(cell_text).unwrap_or_default()).collect())
        .collect();
    Some((headers, rows))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn preview(output: &str) -> String {
    output.chars().take(120).collect()
}
