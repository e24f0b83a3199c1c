use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Daily OHLCV series keyed by date, passed through exactly as the provider returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockSeries(pub Map<String, Value>);

impl StockSeries {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, date: &str) -> Option<&Value> {
        self.0.get(date)
    }

    /// Most recent trading date; provider dates are ISO formatted so lexical order works.
    pub fn latest_date(&self) -> Option<&str> {
        self.0.keys().max().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub time_published: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub overall_sentiment_score: Option<f64>,
    #[serde(default)]
    pub overall_sentiment_label: Option<String>,
}

impl NewsArticle {
    pub const MISSING_SUMMARY: &'static str = "No summary available";

    pub fn document_text(&self) -> String {
        let summary = self.summary.trim();
        if summary.is_empty() {
            Self::MISSING_SUMMARY.to_string()
        } else {
            summary.to_string()
        }
    }

    pub fn metadata(&self) -> Value {
        serde_json::json!({ "title": self.title })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GainerLoserEntry {
    pub ticker: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub change_amount: String,
    #[serde(default)]
    pub change_percentage: String,
    #[serde(default)]
    pub volume: String,
}

impl GainerLoserEntry {
    /// Change without the provider's trailing `%`, so formatting never doubles it.
    pub fn change(&self) -> &str {
        self.change_percentage.trim().trim_end_matches('%')
    }

    pub fn document_text(&self) -> String {
        format!("{} - ${} ({}%)", self.ticker, self.price, self.change())
    }

    pub fn metadata(&self) -> Value {
        serde_json::json!({
            "ticker": self.ticker,
            "price": self.price,
            "change": self.change(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopMovers {
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub top_gainers: Vec<GainerLoserEntry>,
    #[serde(default)]
    pub top_losers: Vec<GainerLoserEntry>,
    #[serde(default)]
    pub most_actively_traded: Vec<GainerLoserEntry>,
}
