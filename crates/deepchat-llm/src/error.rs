use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Missing content in response: {0}")]
    MissingContent(String),

    #[error("Credential error: {0}")]
    Credential(String),
}

/// Coarse classification of a [`ChatError`], for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    HttpStatus(u16),
    Decode,
    Credential,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Transport(_) => ErrorKind::Transport,
            ChatError::HttpStatus { status, .. } => ErrorKind::HttpStatus(*status),
            ChatError::Decode(_) | ChatError::MissingContent(_) => ErrorKind::Decode,
            ChatError::Credential(_) => ErrorKind::Credential,
        }
    }

    /// Short explanation suitable for showing to an end user.
    pub fn hint(&self) -> String {
        match self.kind() {
            ErrorKind::HttpStatus(401) => {
                "The API key was rejected, check that it is configured correctly".to_string()
            }
            ErrorKind::HttpStatus(429) => "Too many requests, please try again later".to_string(),
            ErrorKind::HttpStatus(500) => {
                "The server hit an internal error, please try again later".to_string()
            }
            ErrorKind::Credential => format!("Could not load the API key: {}", self),
            _ => format!("Network error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
