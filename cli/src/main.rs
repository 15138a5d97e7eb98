//! fxquery CLI
//!
//! Reads conversion queries such as `100 JPY to USD` from standard input and
//! prints the converted amount.

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fxquery_fx::{build_resolver, ConversionEngine, FxConfig, QueryReader};

mod session;

use session::Session;

/// fxquery CLI
#[derive(Parser, Debug)]
#[command(name = "fxquery")]
#[command(about = "Convert currencies with free-text queries", version)]
struct Args {
    /// Use cached rates regardless of their age
    #[arg(short, long)]
    force: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = FxConfig::from_env()?;
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }
    debug!(
        base = %config.base_currency,
        precision = config.precision,
        cache = ?config.cache.backend,
        "Configuration loaded"
    );

    let resolver = build_resolver(&config)?;
    let engine = ConversionEngine::new(config.base_currency.clone(), config.precision);

    let stdin = std::io::stdin();
    let reader = QueryReader::new(stdin.lock(), std::io::stdout());

    Session::new(reader, resolver, engine, args.force).run().await?;
    Ok(())
}
