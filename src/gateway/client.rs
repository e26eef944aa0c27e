// src/gateway/client.rs
use std::future::Future;
use std::time::Duration;

use reqwest::header;

use crate::gateway::models::{parse_gateway_body, GatewayParams, GatewayRequest};
use crate::utils::error::GatewayError;

const USER_AGENT: &str = concat!("contingent_extractor/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Llama 3 chat framing the gateway expects around every prompt.
const PROMPT_PREFIX: &str = "<|begin_of_text|><|start_header_id|>user<|end_header_id|>\n";
const PROMPT_SUFFIX: &str = "<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n";

/// Anything that turns a prompt into completion text.
pub trait LanguageModel {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, GatewayError>> + Send;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub token: String,
    /// Header carrying the token; "authorization" sends it as a bearer token.
    pub token_header: String,
    pub provider: String,
    pub deployment: String,
    pub spec_version: u32,
    pub temperature: f32,
    pub accept_invalid_certs: bool,
}

impl GatewayConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            token_header: "token".to_string(),
            provider: "tgi".to_string(),
            deployment: "Llama 3.3 v1".to_string(),
            spec_version: 1,
            temperature: 0.1,
            accept_invalid_certs: false,
        }
    }
}

pub fn wrap_prompt(prompt: &str) -> String {
    format!("{}{}{}", PROMPT_PREFIX, prompt, PROMPT_SUFFIX)
}

/// Removes the echoed prompt template from the model output.
pub fn strip_echo(output: &str, template: &str) -> String {
    output.replace(template, "").trim().to_string()
}

/// Client for the hosted LLM gateway. Built once and passed to the pipeline.
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.token.trim().is_empty() {
            return Err(GatewayError::MissingToken);
        }
        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate verification disabled for {}", config.endpoint);
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { http, config })
    }

    fn token_value(&self) -> String {
        if self.config.token_header.eq_ignore_ascii_case("authorization") {
            format!("Bearer {}", self.config.token)
        } else {
            self.config.token.clone()
        }
    }

    async fn call(&self, prompt: &str) -> Result<String, GatewayError> {
        let template = wrap_prompt(prompt);
        let body = GatewayRequest {
            provider: &self.config.provider,
            deployment: &self.config.deployment,
            spec_version: self.config.spec_version,
            input_text: &template,
            params: GatewayParams { temperature: self.config.temperature },
        };

        tracing::debug!("POST {} ({} prompt chars)", self.config.endpoint, prompt.len());
        let response = self
            .http
            .post(&self.config.endpoint)
            .header(self.config.token_header.as_str(), self.token_value())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("Gateway returned HTTP {}", status);
            return Err(GatewayError::Http(status));
        }

        let text = response.text().await?;
        let parsed = parse_gateway_body(&text)?;
        let output = strip_echo(&parsed.output_text(), &template);
        tracing::trace!("Gateway output: {}", output);
        Ok(output)
    }
}

impl LanguageModel for GatewayClient {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        self.call(prompt).await
    }
}
