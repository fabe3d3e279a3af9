#![doc = "LLM gateway: provider registry, retrying HTTP transport, and tolerant response parsing."]

pub mod gateway;
pub mod parse;
pub mod provider;
pub mod retry;

pub use gateway::{GatewayConfig, HttpGateway, LlmGateway};
pub use parse::{parse_label_payload, parse_opinion_list};
pub use provider::Provider;
pub use retry::RetryPolicy;
