use std::error::Error;

use clap::Parser;
use sensorts::{cli::model::Cli, config::TimeSeriesConfig, timeseries::TimeSeries};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = TimeSeriesConfig::load(cli.config.as_deref())?;
    let ts = TimeSeries::connect(&cfg).await?;

    let res = cli.dispatch(&ts).await;
    ts.close().await?;
    match res {
        Ok(Some(out)) => println!("{out}"),
        Ok(None) => {}
        Err(e) => {
            error!("{e}");
            println!("{}", serde_json::to_string(&e)?);
            std::process::exit(1);
        }
    }
    Ok(())
}
