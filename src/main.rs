use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};
use tube_metadata::config::LoggingConfig;
use tube_metadata::store::{parse_store_date, store_date};
use tube_metadata::{Config, MetadataCollector, StoreFile};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let matches = Command::new("tube-metadata")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Collects watch page meta tags into a date-stamped JSON store")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: tube-metadata.toml if present)")
        )
        .arg(
            Arg::new("store-dir")
                .short('s')
                .long("store-dir")
                .value_name("DIR")
                .help("Directory holding the metadata store files")
        )
        .arg(
            Arg::new("video-id")
                .long("video-id")
                .value_name("ID")
                .help("Video id to collect; repeat to collect several")
                .action(ArgAction::Append)
        )
        .arg(
            Arg::new("date")
                .long("date")
                .value_name("YYYYMMDD")
                .help("Store date to use instead of today")
        )
        .arg(
            Arg::new("utc")
                .long("utc")
                .help("Stamp the store file with the UTC date")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
        )
        .get_matches();

    // Installed before the config loads so its warnings are not lost; the
    // configured level is swapped in afterwards unless RUST_LOG is set.
    // Progress lines go to stdout, logs to stderr
    let verbose = matches.get_flag("verbose");
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(env_filter.unwrap_or_else(|| {
        EnvFilter::new(LoggingConfig::default().filter_directive(verbose))
    }));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(Path::new(path))
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::load()?,
    };

    if let Some(store_dir) = matches.get_one::<String>("store-dir") {
        config.collector.store_dir = PathBuf::from(store_dir);
    }

    if let Some(ids) = matches.get_many::<String>("video-id") {
        config.collector.video_ids = ids.cloned().collect();
    }

    if matches.get_flag("utc") {
        config.collector.use_utc = true;
    }

    if !from_env {
        filter_handle
            .reload(EnvFilter::new(config.logging.filter_directive(verbose)))
            .context("Failed to apply configured log level")?;
    }

    config.validate()?;
    info!("🚀 Tube metadata collector starting...");
    for line in config.summary().lines() {
        info!("{}", line);
    }

    let date = match matches.get_one::<String>("date") {
        Some(stamp) => parse_store_date(stamp)?,
        None => store_date(config.collector.use_utc),
    };
    let store_file = StoreFile::dated(
        &config.collector.store_dir,
        &config.collector.file_prefix,
        date,
    );
    info!("📂 Store file: {}", store_file.path().display());

    let collector = MetadataCollector::from_config(&config)?;

    let start_time = std::time::Instant::now();
    let summary = collector
        .run(&config.collector.video_ids, &store_file)
        .await?;

    info!(
        "✅ Fetched {} and skipped {} videos in {:.2}s",
        summary.fetched.len(),
        summary.skipped.len(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
