use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketletter_core::domain::market::StockSeries;
use marketletter_core::market::error::{ErrorBody, MarketDataError};
use marketletter_core::pipeline::{IngestOutcome, NewsletterPipeline, NewsletterReport};

const INDEX_HTML: &str = include_str!("index.html");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = marketletter_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    // Missing secrets or an unusable store abort startup.
    if let Err(e) = settings.require_api_keys() {
        sentry_anyhow::capture_anyhow(&e);
        return Err(e);
    }
    let pipeline = match NewsletterPipeline::from_settings(&settings).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            return Err(e);
        }
    };

    let app = router(AppState::new(pipeline));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/actions/news", post(post_ingest_news))
        .route("/actions/trends", post(post_ingest_trends))
        .route("/actions/newsletter", post(post_generate_newsletter))
        .route("/stocks/:ticker", get(get_stock_series))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone)]
struct AppState {
    pipeline: NewsletterPipeline,
    // Triggers run one at a time, like button handlers in a single UI session.
    action_lock: Arc<Mutex<()>>,
}

impl AppState {
    fn new(pipeline: NewsletterPipeline) -> Self {
        Self {
            pipeline,
            action_lock: Arc::new(Mutex::new(())),
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn post_ingest_news(State(state): State<AppState>) -> Json<IngestOutcome> {
    let _guard = state.action_lock.lock().await;
    let outcome = state.pipeline.ingest_news().await;
    outcome.notices.iter().for_each(|n| n.log());
    Json(outcome)
}

async fn post_ingest_trends(State(state): State<AppState>) -> Json<IngestOutcome> {
    let _guard = state.action_lock.lock().await;
    let outcome = state.pipeline.ingest_trends().await;
    outcome.notices.iter().for_each(|n| n.log());
    Json(outcome)
}

async fn post_generate_newsletter(State(state): State<AppState>) -> Json<NewsletterReport> {
    let _guard = state.action_lock.lock().await;
    let report = state.pipeline.generate_newsletter().await;
    report.notices.iter().for_each(|n| n.log());
    Json(report)
}

async fn get_stock_series(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<StockSeries>, (StatusCode, Json<ErrorBody>)> {
    if ticker.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "ticker must be non-empty".to_string(),
                kind: "request",
            }),
        ));
    }

    state.pipeline.stock_series(&ticker).await.map(Json).map_err(|err| {
        tracing::warn!(%ticker, kind = err.kind(), error = %err, "stock series request failed");
        let status = match &err {
            MarketDataError::Upstream(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(err.to_error_body()))
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &marketletter_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
