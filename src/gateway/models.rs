// src/gateway/models.rs
use serde::{Deserialize, Serialize};

use crate::utils::error::GatewayError;

/// Body of a gateway call.
/// Example: {"provider":"tgi","deployment":"Llama 3.3 v1","spec_version":1,"input_text":"...","params":{"temperature":0.1}}
#[derive(Debug, Serialize)]
pub struct GatewayRequest<'a> {
    pub provider: &'a str,
    pub deployment: &'a str,
    pub spec_version: u32,
    pub input_text: &'a str,
    pub params: GatewayParams,
}

#[derive(Debug, Serialize)]
pub struct GatewayParams {
    pub temperature: f32,
}

/// The gateway answers with a mapping holding at least `output`.
#[derive(Debug, Deserialize)]
pub struct GatewayResponse {
    pub output: serde_json::Value,
}

impl GatewayResponse {
    /// `output` as text; non-string values are rendered as JSON.
    pub fn output_text(&self) -> String {
        match &self.output {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Parses a response body that is either JSON or a Python literal mapping.
pub fn parse_gateway_body(body: &str) -> Result<GatewayResponse, GatewayError> {
    if let Ok(parsed) = serde_json::from_str::<GatewayResponse>(body) {
        return Ok(parsed);
    }
    let converted = python_literal_to_json(body);
    serde_json::from_str::<GatewayResponse>(&converted).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        GatewayError::Parse(format!("{} (body starts: {:?})", e, preview))
    })
}

/// Rewrites a Python literal (single-quoted strings, True/False/None) as JSON.
pub fn python_literal_to_json(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len() + 16);
    let mut chars = literal.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push('"');
                read_string(&mut chars, c, &mut out);
                out.push('"');
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => &word,
                });
            }
            '(' => out.push('['),
            ')' => out.push(']'),
            _ => out.push(c),
        }
    }
    out
}

fn read_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char, out: &mut String) {
    while let Some(c) = chars.next() {
        match c {
            c if c == quote => return,
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    out.push_str("\\u00");
                    out.push_str(&hex);
                }
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str("\\\\"),
            },
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_body() {
        let parsed = parse_gateway_body(r#"{"output": "True", "tokens": 3}"#).unwrap();
        assert_eq!(parsed.output_text(), "True");
    }

    #[test]
    fn python_literal_body() {
        let body = r#"{'output': 'It\'s "Relevant"\n', 'cached': False, 'meta': None, 'span': (1, 2)}"#;
        let parsed = parse_gateway_body(body).unwrap();
        assert_eq!(parsed.output_text(), "It's \"Relevant\"\n");
    }

    #[test]
    fn identifiers_inside_strings_are_kept() {
        assert_eq!(
            python_literal_to_json("{'output': 'True or False', 'ok': True}"),
            r#"{"output": "True or False", "ok": true}"#
        );
    }

    #[test]
    fn non_string_output_is_rendered() {
        let parsed = parse_gateway_body(r#"{"output": {"relevance": "Relevant"}}"#).unwrap();
        assert_eq!(parsed.output_text(), r#"{"relevance":"Relevant"}"#);
    }

    #[test]
    fn body_without_output_is_an_error() {
        assert!(matches!(parse_gateway_body("{'error': 'overloaded'}"), Err(GatewayError::Parse(_))));
        assert!(matches!(parse_gateway_body("<html>502</html>"), Err(GatewayError::Parse(_))));
    }

    #[test]
    fn request_serializes_contract_fields() {
        let req = GatewayRequest {
            provider: "tgi",
            deployment: "Llama 3.3 v1",
            spec_version: 1,
            input_text: "hi",
            params: GatewayParams { temperature: 0.5 },
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "provider": "tgi",
                "deployment": "Llama 3.3 v1",
                "spec_version": 1,
                "input_text": "hi",
                "params": {"temperature": 0.5}
            })
        );
    }
}
