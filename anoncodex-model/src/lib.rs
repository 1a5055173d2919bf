//! # anoncodex-model
//!
//! Provider-neutral access to chat models.
//!
//! - [`provider`]: the message types and the five backend adapters
//! - [`gateway`]: [`ModelGateway`], normalization and retry
//!
//! ## Example
//!
//! ```rust,no_run
//! use anoncodex_model::{ChatMessage, ChatModel, ModelGateway, ProviderConfig};
//!
//! # async fn run() -> anoncodex_error::Result<()> {
//! let gateway = ModelGateway::initialize(ProviderConfig::ollama()).await?;
//! let reply = gateway.chat(&[ChatMessage::user("hi")], 0.7).await?;
//! println!("{}", reply);
//! # Ok(())
//! # }
//! ```

pub mod gateway;
pub mod provider;

pub use gateway::{normalize_messages, ChatModel, ModelGateway, TEMPERATURE_RANGE};
pub use provider::{
    Adapter, ChatMessage, GenerationRequest, GenerationResult, ProviderAdapter, ProviderConfig,
    ProviderKind, RetryPolicy, Role,
};
