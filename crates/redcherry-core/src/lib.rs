pub mod ai;
pub mod config;
pub mod format;
pub mod message;
pub mod provider;
pub mod session;
pub mod store;

// Re-export main types for convenience
pub use ai::{
    ChatCompletionRequest, ChatCompletionResponse, HttpInferenceClient, InferenceClient,
    InferenceError, WireMessage, WireRole,
};
pub use config::Config;
pub use format::{format_conversation, format_response, DisplayLine};
pub use message::{Message, Role, GREETING};
pub use provider::{Provider, ProviderConfig};
pub use session::{ChatSession, FailureKind, PendingTurn, SendOutcome, SettledTurn, TurnId};
pub use store::{ConversationStore, StoreEvent};
