pub mod types;
pub mod error;
pub mod traits;
pub mod streaming;
pub mod buffer_utils;
pub mod sink;
pub mod history;
pub mod config;
pub mod credential;
pub mod client;
pub mod persona;
pub mod session;

pub use traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenUsage};

pub use client::DeepSeekClient;
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use credential::{ApiKey, CredentialSource};
pub use error::{ChatError, ErrorKind};
pub use history::History;
pub use persona::{CannedReply, Persona};
pub use session::{ChatSession, ChatSessionBuilder, FailurePolicy};
pub use sink::{FragmentSink, NullSink, WriterSink};
pub use streaming::{StreamAccumulator, StreamEvent, StreamStats};
pub use types::{Message, Role};
