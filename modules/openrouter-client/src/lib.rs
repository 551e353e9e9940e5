pub mod breaker;
pub mod client;
pub mod types;

pub use breaker::{BreakerState, CircuitBreaker};
pub use client::{OpenRouterClient, OpenRouterError};
pub use types::{ChatMessage, ChatRequest, ChatResponse};
