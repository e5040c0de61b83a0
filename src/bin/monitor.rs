use clap::Parser;
use sitewatch::{config::read_config_file, monitor::MonitorHandle, util};
use tracing::{debug, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short, default_value_t = util::get_default_config_path())]
    file: String,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("sitewatch", LevelFilter::TRACE),
        ("monitor", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let (handle, join) = MonitorHandle::spawn(&config)?;

    tokio::signal::ctrl_c().await?;
    debug!("ctrl-c received, shutting down");

    handle.shutdown();
    join.await?;

    Ok(())
}
