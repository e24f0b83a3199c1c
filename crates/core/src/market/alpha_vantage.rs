use crate::config::{request_error_text, Settings};
use crate::domain::market::{NewsArticle, StockSeries, TopMovers};
use crate::market::error::MarketDataError;
use crate::market::MarketDataClient;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const QUERY_PATH: &str = "/query";

const NEWS_LIMIT: u32 = 50;
const NEWS_SORT: &str = "RELEVANCE";

const KEY_DAILY_SERIES: &str = "Time Series (Daily)";
const KEY_ERROR_MESSAGE: &str = "Error Message";
// Rate-limit and premium-endpoint notices arrive with HTTP 200 under these keys.
const NOTICE_KEYS: [&str; 2] = ["Note", "Information"];

#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_settings(settings: &Settings, http: reqwest::Client) -> anyhow::Result<Self> {
        let api_key = settings.require_alpha_vantage_api_key()?;
        let base_url = settings
            .alpha_vantage_base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL);
        Ok(Self::new(http, base_url, api_key))
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), QUERY_PATH)
    }

    async fn get_json(&self, target: &str, params: &[(&str, String)]) -> Result<Value, MarketDataError> {
        let res = self
            .http
            .get(self.url())
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| MarketDataError::Network {
                target: target.to_string(),
                message: request_error_text(e),
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(MarketDataError::Status {
                target: target.to_string(),
                status: status.as_u16(),
            });
        }

        let text = res.text().await.map_err(|e| MarketDataError::Network {
            target: target.to_string(),
            message: request_error_text(e),
        })?;

        serde_json::from_str::<Value>(&text).map_err(|e| MarketDataError::Parse {
            target: target.to_string(),
            message: format!("response is not valid JSON: {e}"),
        })
    }
}

fn provider_error(body: &Value) -> Option<MarketDataError> {
    if let Some(msg) = body.get(KEY_ERROR_MESSAGE).and_then(Value::as_str) {
        return Some(MarketDataError::Upstream(msg.to_string()));
    }
    NOTICE_KEYS
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(|msg| MarketDataError::Upstream(msg.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(target: &str, value: Value) -> Result<T, MarketDataError> {
    serde_json::from_value(value).map_err(|e| MarketDataError::Parse {
        target: target.to_string(),
        message: e.to_string(),
    })
}

#[async_trait::async_trait]
impl MarketDataClient for AlphaVantageClient {
    fn provider_name(&self) -> &'static str {
        "alpha_vantage"
    }

    async fn fetch_daily_stock_data(&self, ticker: &str) -> Result<StockSeries, MarketDataError> {
        let target = format!("TIME_SERIES_DAILY for {ticker}");
        let mut body = self
            .get_json(
                &target,
                &[
                    ("function", "TIME_SERIES_DAILY".to_string()),
                    ("symbol", ticker.to_string()),
                ],
            )
            .await?;

        if let Some(series) = body.get_mut(KEY_DAILY_SERIES).map(Value::take) {
            return decode(&target, series);
        }
        if let Some(err) = provider_error(&body) {
            tracing::warn!(%ticker, error = %err, "provider rejected daily series request");
            return Err(err);
        }
        Err(MarketDataError::Parse {
            target,
            message: "Unexpected API response format.".to_string(),
        })
    }

    async fn fetch_market_news(&self) -> Result<Vec<NewsArticle>, MarketDataError> {
        let target = "NEWS_SENTIMENT";
        let mut body = self
            .get_json(
                target,
                &[
                    ("function", target.to_string()),
                    ("limit", NEWS_LIMIT.to_string()),
                    ("sort", NEWS_SORT.to_string()),
                ],
            )
            .await?;

        if let Some(err) = provider_error(&body) {
            return Err(err);
        }
        match body.get_mut("feed").map(Value::take) {
            Some(feed) => decode(target, feed),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_gainers_losers(&self) -> Result<TopMovers, MarketDataError> {
        let target = "TOP_GAINERS_LOSERS";
        let body = self
            .get_json(target, &[("function", target.to_string())])
            .await?;

        if let Some(err) = provider_error(&body) {
            return Err(err);
        }
        decode(target, body)
    }
}
