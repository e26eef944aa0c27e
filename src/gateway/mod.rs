// src/gateway/mod.rs
pub mod classify;
pub mod client;
pub mod models;
pub mod response;

pub use classify::Classifier;
pub use client::{GatewayClient, GatewayConfig, LanguageModel};
pub use response::{PageVerdict, Relevance};
