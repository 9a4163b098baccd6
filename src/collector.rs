/// Collection run: load the day's store, fetch each unseen video, flush
/// after every addition
use crate::config::Config;
use crate::error::Result;
use crate::extract::MetaExtractor;
use crate::fetch::{DocumentSource, PageFetcher};
use crate::store::{MetadataStore, StoreFile};
use std::path::PathBuf;
use tracing::{debug, info};

/// What a completed run did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Store file the run wrote to
    pub store_path: PathBuf,
    /// Ids fetched and flushed, in order
    pub fetched: Vec<String>,
    /// Ids already present in the store
    pub skipped: Vec<String>,
}

/// Progress line for a video already in the store
pub fn skip_notice(video_id: &str, file_name: &str) -> String {
    format!(
        "Skipping video {}, metadata already exists in {}",
        video_id, file_name
    )
}

/// Progress line for a freshly flushed video
pub fn saved_notice(video_id: &str, file_name: &str) -> String {
    format!("Metadata for video {} saved to {}", video_id, file_name)
}

/// Sequential metadata collector
pub struct MetadataCollector<S> {
    source: S,
    extractor: MetaExtractor,
}

impl MetadataCollector<PageFetcher> {
    /// HTTP-backed collector from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            PageFetcher::new(&config.http)?,
            MetaExtractor::from_config(&config.extract)?,
        ))
    }
}

impl<S: DocumentSource> MetadataCollector<S> {
    pub fn new(source: S, extractor: MetaExtractor) -> Self {
        Self { source, extractor }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Process `video_ids` in order against `store_file`. The first error
    /// aborts the run; entries flushed before it stay on disk.
    pub async fn run<I, T>(&self, video_ids: I, store_file: &StoreFile) -> Result<RunSummary>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut store = store_file.load().await?;
        let file_name = store_file.file_name();
        let mut summary = RunSummary {
            store_path: store_file.path().to_path_buf(),
            ..RunSummary::default()
        };

        for video_id in video_ids {
            let video_id = video_id.as_ref();

            if store.contains(video_id) {
                println!("{}", skip_notice(video_id, &file_name));
                summary.skipped.push(video_id.to_string());
                continue;
            }

            store = self.collect_one(store, video_id, store_file).await?;
            println!("{}", saved_notice(video_id, &file_name));
            summary.fetched.push(video_id.to_string());
        }

        info!(
            "🎉 Run complete: {} fetched, {} skipped, {} entries in {}",
            summary.fetched.len(),
            summary.skipped.len(),
            store.len(),
            store_file.path().display()
        );
        Ok(summary)
    }

    async fn collect_one(
        &self,
        mut store: MetadataStore,
        video_id: &str,
        store_file: &StoreFile,
    ) -> Result<MetadataStore> {
        debug!("🔍 Collecting {} from {}", video_id, self.source.location(video_id));

        let html = self.source.fetch_document(video_id).await?;
        let attributes = self.extractor.extract(&html);
        info!("🏷️ Extracted {} attributes for {}", attributes.len(), video_id);

        store.insert(video_id, attributes);
        store_file.flush(&store).await?;
        Ok(store)
    }
}
