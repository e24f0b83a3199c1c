use crate::config::Settings;
use crate::domain::market::StockSeries;
use crate::evaluator::bespoke::BespokeEvaluator;
use crate::evaluator::{AccuracyEvaluator, AccuracyLabel, AccuracyOutcome};
use crate::market::alpha_vantage::AlphaVantageClient;
use crate::market::error::MarketDataError;
use crate::market::MarketDataClient;
use crate::newsletter::{NewsletterTemplate, SlotValues, SLOT_COMPANY_INSIGHTS, SLOT_MARKET_TRENDS};
use crate::notice::Notice;
use crate::rag::embedding::embedder_from_settings;
use crate::rag::{IdStrategy, RagHelper, DEFAULT_N_RESULTS};
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub const NEWS_COLLECTION: &str = "news_collection";
pub const TRENDS_COLLECTION: &str = "trends_collection";

pub const NEWS_QUERY: &str = "latest company news";
pub const TRENDS_QUERY: &str = "latest market trends";

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub collection: &'static str,
    pub fetched: usize,
    pub inserted: usize,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsletterReport {
    pub newsletter: String,
    pub accuracy: AccuracyOutcome,
    pub notices: Vec<Notice>,
}

/// The three dashboard triggers over explicitly constructed clients.
#[derive(Clone)]
pub struct NewsletterPipeline {
    market: Arc<dyn MarketDataClient>,
    rag: Arc<RagHelper>,
    evaluator: Arc<dyn AccuracyEvaluator>,
    template: NewsletterTemplate,
    n_results: usize,
}

impl NewsletterPipeline {
    pub fn new(
        market: Arc<dyn MarketDataClient>,
        rag: Arc<RagHelper>,
        evaluator: Arc<dyn AccuracyEvaluator>,
    ) -> Self {
        Self {
            market,
            rag,
            evaluator,
            template: NewsletterTemplate::default(),
            n_results: DEFAULT_N_RESULTS,
        }
    }

    pub fn with_template(mut self, template: NewsletterTemplate) -> Self {
        self.template = template;
        self
    }

    /// Builds every client once; the caller keeps the pipeline for the life of the process.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = settings.http_client()?;

        let market = AlphaVantageClient::from_settings(settings, http.clone())?;
        let evaluator = BespokeEvaluator::from_settings(settings, http.clone())?;
        let embedder = embedder_from_settings(settings, http)?;

        let id_strategy = match settings.rag_id_strategy.as_deref() {
            Some(raw) => raw.parse::<IdStrategy>()?,
            None => IdStrategy::default(),
        };

        let db_path = settings.rag_db_path();
        let pool = crate::storage::connect(db_path)
            .await
            .with_context(|| format!("vector store unavailable at {db_path}"))?;

        tracing::info!(
            db_path,
            embedding_model = embedder.model_name(),
            ?id_strategy,
            "newsletter pipeline ready"
        );

        Ok(Self::new(
            Arc::new(market),
            Arc::new(RagHelper::new(pool, embedder, id_strategy)),
            Arc::new(evaluator),
        ))
    }

    pub fn rag(&self) -> &RagHelper {
        &self.rag
    }

    /// Fetch news → insert summaries into `news_collection`.
    pub async fn ingest_news(&self) -> IngestOutcome {
        let articles = match self.market.fetch_market_news().await {
            Ok(articles) => articles,
            Err(err) => {
                return IngestOutcome::failed(
                    NEWS_COLLECTION,
                    Notice::error(format!("Error fetching market news: {err}")),
                )
            }
        };

        let documents: Vec<String> = articles.iter().map(|a| a.document_text()).collect();
        let metadata: Vec<Value> = articles.iter().map(|a| a.metadata()).collect();
        self.store(NEWS_COLLECTION, documents, metadata).await
    }

    /// Fetch top gainers → insert formatted lines into `trends_collection`.
    pub async fn ingest_trends(&self) -> IngestOutcome {
        let movers = match self.market.fetch_gainers_losers().await {
            Ok(movers) => movers,
            Err(err) => {
                return IngestOutcome::failed(
                    TRENDS_COLLECTION,
                    Notice::error(format!("Error fetching gainers and losers: {err}")),
                )
            }
        };

        let documents: Vec<String> = movers.top_gainers.iter().map(|g| g.document_text()).collect();
        let metadata: Vec<Value> = movers.top_gainers.iter().map(|g| g.metadata()).collect();
        self.store(TRENDS_COLLECTION, documents, metadata).await
    }

    async fn store(
        &self,
        collection: &'static str,
        documents: Vec<String>,
        metadata: Vec<Value>,
    ) -> IngestOutcome {
        let fetched = documents.len();
        if fetched == 0 {
            return IngestOutcome {
                collection,
                fetched,
                inserted: 0,
                notices: vec![Notice::info(format!(
                    "Nothing to add to the '{collection}' collection."
                ))],
            };
        }

        match self.rag.add_to_rag(collection, &documents, &metadata).await {
            Ok(inserted) => IngestOutcome {
                collection,
                fetched,
                inserted,
                notices: vec![Notice::success(format!(
                    "Data successfully added to the '{collection}' collection."
                ))],
            },
            Err(err) => IngestOutcome {
                collection,
                fetched,
                inserted: 0,
                notices: vec![Notice::error(format!("Error adding to RAG: {err}"))],
            },
        }
    }

    async fn retrieve(&self, collection: &str, query: &str, notices: &mut Vec<Notice>) -> Vec<String> {
        match self.rag.query_from_rag(collection, query, self.n_results).await {
            Ok(docs) => docs,
            Err(err) => {
                notices.push(Notice::error(format!("Error querying RAG: {err}")));
                Vec::new()
            }
        }
    }

    /// Query both collections → render → score.
    pub async fn generate_newsletter(&self) -> NewsletterReport {
        let mut notices = Vec::new();

        let company_insights = self.retrieve(NEWS_COLLECTION, NEWS_QUERY, &mut notices).await;
        let market_trends = self.retrieve(TRENDS_COLLECTION, TRENDS_QUERY, &mut notices).await;

        let newsletter = self.template.render(
            &SlotValues::new()
                .with(SLOT_COMPANY_INSIGHTS, company_insights)
                .with(SLOT_MARKET_TRENDS, market_trends),
        );

        let result = self.evaluator.evaluate(&newsletter).await;
        let accuracy = AccuracyOutcome::from_result(&result);
        match &accuracy {
            AccuracyOutcome::Scored { score, label } => {
                notices.push(Notice::info(format!("Newsletter Accuracy Score: {score:.2}")));
                notices.push(match label {
                    AccuracyLabel::High => Notice::success(label.message()),
                    AccuracyLabel::Moderate => Notice::warning(label.message()),
                    AccuracyLabel::Low => Notice::error(label.message()),
                });
            }
            AccuracyOutcome::Unavailable { reason } => {
                notices.push(Notice::error(format!(
                    "Error evaluating newsletter accuracy: {reason}"
                )));
                notices.push(Notice::warning("Could not retrieve the accuracy score."));
            }
        }

        NewsletterReport {
            newsletter,
            accuracy,
            notices,
        }
    }

    pub async fn stock_series(&self, ticker: &str) -> Result<StockSeries, MarketDataError> {
        self.market.fetch_daily_stock_data(ticker.trim()).await
    }
}

impl IngestOutcome {
    fn failed(collection: &'static str, notice: Notice) -> Self {
        Self {
            collection,
            fetched: 0,
            inserted: 0,
            notices: vec![notice],
        }
    }
}
