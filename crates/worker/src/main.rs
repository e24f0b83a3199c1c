use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketletter_core::notice::{Notice, NoticeLevel};
use marketletter_core::pipeline::NewsletterPipeline;

#[derive(Debug, Parser)]
#[command(name = "marketletter_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch market news and add the summaries to the news collection.
    News,
    /// Fetch top gainers and add them to the trends collection.
    Trends,
    /// Render the newsletter from both collections and score it.
    Newsletter,
    /// Print the raw daily series for one ticker as JSON.
    Stock { ticker: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = marketletter_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

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

    let notices = match args.command {
        Command::News => pipeline.ingest_news().await.notices,
        Command::Trends => pipeline.ingest_trends().await.notices,
        Command::Newsletter => {
            let report = pipeline.generate_newsletter().await;
            println!("{}", report.newsletter);
            report.notices
        }
        Command::Stock { ticker } => match pipeline.stock_series(&ticker).await {
            Ok(series) => {
                tracing::info!(%ticker, days = series.len(), latest = ?series.latest_date(), "fetched daily series");
                println!("{}", serde_json::to_string_pretty(&series)?);
                Vec::new()
            }
            Err(err) => {
                println!("{}", serde_json::to_string_pretty(&err.to_error_body())?);
                anyhow::bail!("stock data for {ticker} unavailable: {err}");
            }
        },
    };

    notices.iter().for_each(Notice::log);

    if notices.iter().any(|n| n.level == NoticeLevel::Error) {
        anyhow::bail!("run finished with errors");
    }
    Ok(())
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
