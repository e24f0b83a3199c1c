use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketDataError {
    /// Transport failure before a response arrived.
    #[error("{target} request failed: {message}")]
    Network { target: String, message: String },

    #[error("{target} returned HTTP {status}")]
    Status { target: String, status: u16 },

    /// Business error reported by the provider inside a 200 response.
    #[error("{0}")]
    Upstream(String),

    #[error("{target}: {message}")]
    Parse { target: String, message: String },
}

impl MarketDataError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Status { .. } => "status",
            Self::Upstream(_) => "upstream",
            Self::Parse { .. } => "parse",
        }
    }

    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        }
    }
}

/// Uniform `{"error": message}` shape handed to callers at the HTTP boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_body_carries_provider_message_verbatim() {
        let err = MarketDataError::Upstream("Invalid API call.".to_string());
        let body = serde_json::to_value(err.to_error_body()).unwrap();
        assert_eq!(body["error"], "Invalid API call.");
        assert_eq!(body["kind"], "upstream");
    }
}
