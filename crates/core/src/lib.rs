pub mod domain;
pub mod evaluator;
pub mod market;
pub mod newsletter;
pub mod notice;
pub mod pipeline;
pub mod rag;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    pub const DEFAULT_RAG_DB_PATH: &str = "./data/marketletter.db";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub openai_api_key: Option<String>,
        pub alpha_vantage_api_key: Option<String>,
        pub bespoke_api_key: Option<String>,
        pub openai_base_url: Option<String>,
        pub alpha_vantage_base_url: Option<String>,
        pub bespoke_base_url: Option<String>,
        pub embedding_provider: Option<String>,
        pub embedding_model: Option<String>,
        pub rag_db_path: Option<String>,
        pub rag_id_strategy: Option<String>,
        pub http_timeout_secs: Option<u64>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from an arbitrary key lookup; blank values count as unset.
        pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
        where
            F: Fn(&str) -> Option<String>,
        {
            let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            let http_timeout_secs = match get("HTTP_TIMEOUT_SECS") {
                Some(raw) => Some(
                    raw.trim()
                        .parse::<u64>()
                        .with_context(|| format!("HTTP_TIMEOUT_SECS must be an integer (got {raw})"))?,
                ),
                None => None,
            };

            Ok(Self {
                openai_api_key: get("OPENAI_API_KEY"),
                alpha_vantage_api_key: get("ALPHA_VANTAGE_API_KEY"),
                bespoke_api_key: get("BESPOKE_API_KEY"),
                openai_base_url: get("OPENAI_BASE_URL"),
                alpha_vantage_base_url: get("ALPHA_VANTAGE_BASE_URL"),
                bespoke_base_url: get("BESPOKE_BASE_URL"),
                embedding_provider: get("EMBEDDING_PROVIDER"),
                embedding_model: get("EMBEDDING_MODEL"),
                rag_db_path: get("RAG_DB_PATH"),
                rag_id_strategy: get("RAG_ID_STRATEGY"),
                http_timeout_secs,
                sentry_dsn: get("SENTRY_DSN"),
            })
        }

        /// Fails with a single diagnostic naming every missing secret.
        pub fn require_api_keys(&self) -> anyhow::Result<()> {
            let missing: Vec<&str> = [
                ("OPENAI_API_KEY", &self.openai_api_key),
                ("ALPHA_VANTAGE_API_KEY", &self.alpha_vantage_api_key),
                ("BESPOKE_API_KEY", &self.bespoke_api_key),
            ]
            .into_iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k)
            .collect();

            anyhow::ensure!(
                missing.is_empty(),
                "missing required configuration: {}",
                missing.join(", ")
            );
            Ok(())
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn require_alpha_vantage_api_key(&self) -> anyhow::Result<&str> {
            self.alpha_vantage_api_key
                .as_deref()
                .context("ALPHA_VANTAGE_API_KEY is required")
        }

        pub fn require_bespoke_api_key(&self) -> anyhow::Result<&str> {
            self.bespoke_api_key
                .as_deref()
                .context("BESPOKE_API_KEY is required")
        }

        pub fn rag_db_path(&self) -> &str {
            self.rag_db_path.as_deref().unwrap_or(DEFAULT_RAG_DB_PATH)
        }

        /// Shared reqwest client. Without `HTTP_TIMEOUT_SECS` the library default applies.
        pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
            let mut builder = reqwest::Client::builder();
            if let Some(secs) = self.http_timeout_secs {
                builder = builder.timeout(Duration::from_secs(secs));
            }
            builder.build().context("failed to build reqwest client")
        }
    }

    /// Transport error text with the request URL removed (query strings may carry keys),
    /// followed by its source chain.
    pub fn request_error_text(err: reqwest::Error) -> String {
        let err = err.without_url();
        let mut text = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }

}
