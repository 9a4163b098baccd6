use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tube_metadata::store::{discover_store_files, parse_store_date, store_date};
use tube_metadata::StoreFile;

#[derive(Parser)]
#[command(name = "store-manager")]
#[command(about = "Metadata store maintenance utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = "data/metadata/video")]
    store_dir: PathBuf,

    #[arg(long, default_value = "video_metadata_")]
    prefix: String,

    /// Store date (YYYYMMDD); defaults to today
    #[arg(long, global = true)]
    date: Option<String>,

    /// Explicit store file; overrides --store-dir and --date
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Use the UTC date for "today"
    #[arg(long, global = true)]
    utc: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List all dated store files
    Files,
    /// List the videos recorded in a store
    List,
    /// Get store statistics
    Stats,
    /// Print the attributes recorded for one video
    Show {
        /// Video id (e.g., "GTWogFFA7TE")
        video_id: String,
    },
    /// Remove a video so the next run fetches it again
    Remove {
        /// Video id to remove
        video_id: String,
    },
    /// Remove every video whose page yielded no attributes
    PruneEmpty,
}

impl Cli {
    fn store_file(&self) -> Result<StoreFile> {
        if let Some(file) = &self.file {
            return Ok(StoreFile::new(file.clone()));
        }

        let date = match &self.date {
            Some(stamp) => parse_store_date(stamp)?,
            None => store_date(self.utc),
        };
        Ok(StoreFile::dated(&self.store_dir, &self.prefix, date))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let cli = Cli::parse();

    if let Commands::Files = cli.command {
        if !cli.store_dir.exists() {
            info!("📭 Store directory does not exist: {}", cli.store_dir.display());
            return Ok(());
        }

        let files = discover_store_files(&cli.store_dir, &cli.prefix)?;
        if files.is_empty() {
            info!("📭 No store files found in {}", cli.store_dir.display());
            return Ok(());
        }

        info!("📚 Found {} store files:", files.len());
        for file in files {
            let store = file.read_existing().await?;
            info!("  {} - {} videos", file.file_name(), store.len());
        }
        return Ok(());
    }

    let store_file = cli.store_file()?;
    if !store_file.path().exists() {
        bail!("Store file not found: {}", store_file.path().display());
    }
    let mut store = store_file.read_existing().await?;

    match cli.command {
        Commands::Files => {}

        Commands::List => {
            if store.is_empty() {
                info!("📭 No videos recorded in {}", store_file.file_name());
                return Ok(());
            }

            info!("📚 {} videos in {}:", store.len(), store_file.file_name());
            for (video_id, attributes) in store.iter() {
                let title = attributes.get("name").map(String::as_str).unwrap_or("-");
                info!("  {} - {} attributes - {}", video_id, attributes.len(), title);
            }
        }

        Commands::Stats => {
            let stats = store.stats();
            info!("📊 Store Statistics ({}):", store_file.file_name());
            info!("  Videos: {}", stats.total_entries);
            info!("  Empty entries: {}", stats.empty_entries);
            info!("  Total attributes: {}", stats.total_attributes);
        }

        Commands::Show { video_id } => match store.get(&video_id) {
            Some(attributes) => {
                info!("🏷️ {} ({} attributes):", video_id, attributes.len());
                for (name, value) in attributes {
                    info!("  {} = {}", name, value);
                }
            }
            None => warn!("⚠️ Video not found: {}", video_id),
        },

        Commands::Remove { video_id } => {
            if store.remove(&video_id).is_some() {
                store_file.flush(&store).await?;
                info!("✅ Removed {} from {}", video_id, store_file.file_name());
            } else {
                warn!("⚠️ Video not found: {}", video_id);
            }
        }

        Commands::PruneEmpty => {
            let removed = store.prune_empty();
            if !removed.is_empty() {
                store_file.flush(&store).await?;
            }
            info!("🧹 Pruned {} empty entries", removed.len());
            for video_id in removed {
                info!("  {}", video_id);
            }
        }
    }

    Ok(())
}
