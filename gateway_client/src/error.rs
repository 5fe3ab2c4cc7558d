use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Transport error")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Failed to decode gateway response: {0}")]
    Decode(String),
    #[error("Gateway request did not complete within {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    pub fn decode(reason: impl ToString) -> Self {
        Self::Decode(reason.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Failures expected to go away on their own: transport errors, timeouts,
    /// rate limiting and server side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound(_) | Self::Decode(_) => false,
        }
    }
}
