pub mod alpha_vantage;
pub mod error;

use crate::domain::market::{NewsArticle, StockSeries, TopMovers};
use crate::market::error::MarketDataError;

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_daily_stock_data(&self, ticker: &str) -> Result<StockSeries, MarketDataError>;

    async fn fetch_market_news(&self) -> Result<Vec<NewsArticle>, MarketDataError>;

    async fn fetch_gainers_losers(&self) -> Result<TopMovers, MarketDataError>;
}
