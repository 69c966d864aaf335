use thiserror::Error;

/// Failures raised by the remote policy engine or its transport.
///
/// `Clone` so one failure can be handed to every caller joined on a shared
/// in-flight request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("policy engine returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid policy engine response: {0}")]
    Decode(String),
    #[error("policy engine answered {received} decisions for {requested} requests")]
    IncompleteResponse { requested: usize, received: usize },
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}
