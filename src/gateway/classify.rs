// src/gateway/classify.rs
use crate::extractors::table::{TableResult, TableSource};
use crate::gateway::client::LanguageModel;
use crate::gateway::response::{parse_flag, parse_rows, parse_verdict, PageVerdict, Relevance};

// --- Constants ---
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.85;

// --- Prompts ---
const STAGE_ONE_PROMPT: &str = r#"
You are an expert Financial Analyst. You will be given the text content of one page of an annual report.
Decide whether the page contains the "Contingent Liabilities" table.

Rules:
1. The page must contain an actual table, not just a reference to one.
2. Ignore partial or incomplete mentions.

Return ONLY valid JSON in exactly this format:
{
  "relevance": "Relevant" or "Non Relevant",
  "confidence": 0.85
}

Page Text:
{page_text}
"#;

const STAGE_TWO_PROMPT: &str = r#"
You are verifying a page for accuracy.
Confirm whether the page contains the "Contingent Liabilities" table.

Requirements:
- Must include the heading "Contingent Liabilities" or a close variation.
- Must have a tabular format with multiple rows.
- If any requirement is missing, answer "Non Relevant".

Return ONLY valid JSON in exactly this format:
{
  "relevance": "Relevant" or "Non Relevant",
  "confidence": 0.90
}

Page Text:
{page_text}
"#;

const TABLE_FLAG_PROMPT: &str = r#"
You are a reliable assistant with deep expertise in financial reporting, especially in recognising tables of contingent liabilities.

Task: given the content of a financial table, decide whether it is a contingent liabilities table.

Instructions:
- Analyse the table content below.
- Look for wording commonly associated with contingent liabilities, such as:
  "contingent liability", "contingent liabilities", "guarantees", "claims", "litigation", "disputed", "not acknowledged as debt", "pending cases", "bonds", "letters of credit", "bank guarantees", "legal proceedings", "tax disputes", "unascertained liabilities", "claims against the company", "arbitration", "court cases", "surety", "indemnity", "commitments", "possible obligations"
- Consider the column headers and any notes that indicate possible obligations not yet recognised as liabilities.
- Respond ONLY with 'True' if the table is about contingent liabilities, or 'False' if it is not.
- Do not add explanations or any other text.

Output: True or False

Table Content:
{table}
"#;

const TABLE_ROWS_PROMPT: &str = r#"
You are a financial data extraction expert.
You are given a markdown rendering of a PDF page.

Your task:
- Identify the table titled "Contingent Liabilities" or a close variation.
- Extract ONLY that table as a JSON array where each row is an object.
- Ignore all other tables.

Return ONLY valid JSON in this format:
[
    { "Column1": "Value1", "Column2": "Value2" },
    { "Column1": "Value3", "Column2": "Value4" }
]

If no contingent liabilities table is found, return: []

Markdown:
{markdown}
"#;

fn render(template: &str, key: &str, value: &str) -> String {
    template.replace(key, value).trim_start().to_string()
}

/// Model-backed page and table decisions. A failed model call counts as
/// "not relevant" and never stops the run.
pub struct Classifier<'a, M: LanguageModel> {
    model: &'a M,
    threshold: f64,
}

impl<'a, M: LanguageModel> Classifier<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model, threshold: DEFAULT_CONFIDENCE_THRESHOLD }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    async fn ask(&self, what: &str, prompt: String) -> Option<String> {
        match self.model.complete(&prompt).await {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::error!("Model call for {} failed: {}", what, e);
                None
            }
        }
    }

    async fn verdict(&self, what: &str, template: &str, page_text: &str) -> PageVerdict {
        match self.ask(what, render(template, "{page_text}", page_text)).await {
            Some(output) => parse_verdict(&output),
            None => PageVerdict::not_relevant(),
        }
    }

    /// Coarse relevance pass.
    pub async fn stage_one(&self, page_text: &str) -> PageVerdict {
        self.verdict("stage 1", STAGE_ONE_PROMPT, page_text).await
    }

    /// Stricter confirmation pass.
    pub async fn stage_two(&self, page_text: &str) -> PageVerdict {
        self.verdict("stage 2", STAGE_TWO_PROMPT, page_text).await
    }

    /// Both stages: stage one must be relevant with enough confidence, then
    /// stage two must agree. Stage two is skipped when stage one rejects.
    pub async fn is_relevant_page(&self, page: usize, page_text: &str) -> bool {
        let first = self.stage_one(page_text).await;
        tracing::debug!("Stage 1 - page {}: {:?}", page, first);
        if !first.passes(self.threshold) {
            return false;
        }

        let second = self.stage_two(page_text).await;
        tracing::debug!("Stage 2 - page {}: {:?}", page, second);
        second.relevance.is_relevant()
    }

    /// Asks whether a table is a contingent-liabilities table.
    pub async fn classify_table(&self, table: &TableResult) -> Relevance {
        match self.ask("table flag", render(TABLE_FLAG_PROMPT, "{table}", &table.to_markdown())).await {
            Some(output) => parse_flag(&output),
            None => Relevance::NotRelevant,
        }
    }

    /// Has the model pull the contingent-liabilities table out of page markdown.
    pub async fn extract_table(&self, markdown: &str, page: Option<usize>) -> Option<TableResult> {
        let output = self.ask("table rows", render(TABLE_ROWS_PROMPT, "{markdown}", markdown)).await?;
        let Some((headers, rows)) = parse_rows(&output) else {
            tracing::warn!("Model returned no readable rows for page {:?}", page);
            return None;
        };
        TableResult::from_rows(rows, Some(headers), TableSource::Model, page)
    }
}

#[cfg(test)]
pub mod scripted {
    use std::sync::Mutex;

    use crate::gateway::client::LanguageModel;
    use crate::utils::error::GatewayError;

    type Reply = Box<dyn Fn(&str) -> Result<String, GatewayError> + Send + Sync>;

    /// Answers prompts with a closure and records what it was asked.
    pub struct ScriptedModel {
        reply: Reply,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(reply: impl Fn(&str) -> Result<String, GatewayError> + Send + Sync + 'static) -> Self {
            Self { reply: Box::new(reply), prompts: Mutex::new(Vec::new()) }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.reply)(prompt)
        }
    }
}
