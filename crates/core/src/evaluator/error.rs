use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("evaluation request failed: {0}")]
    Network(String),

    #[error("evaluation API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid evaluation response: {0}")]
    Parse(String),
}

impl EvaluatorError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::Parse(_) => "parse",
        }
    }
}
