/// On-disk metadata store: one JSON object per day mapping video id to its
/// extracted meta attributes
use crate::error::{CollectorError, Result};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Attribute name to attribute value, for one video
pub type AttributeMap = BTreeMap<String, String>;

/// Date format used in store file names
pub const STORE_DATE_FORMAT: &str = "%Y%m%d";

/// In-memory copy of a store file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    entries: BTreeMap<String, AttributeMap>,
}

/// Store statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StoreStats {
    pub total_entries: usize,
    pub empty_entries: usize,
    pub total_attributes: usize,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw store file contents. Zero bytes and a bare `null` both
    /// yield an empty store; a `null` entry is a present key with no
    /// attributes.
    pub fn from_slice(bytes: &[u8], path: &Path) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }

        let entries: Option<BTreeMap<String, Option<AttributeMap>>> =
            serde_json::from_slice(bytes).map_err(|source| CollectorError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            entries: entries
                .unwrap_or_default()
                .into_iter()
                .map(|(video_id, attributes)| (video_id, attributes.unwrap_or_default()))
                .collect(),
        })
    }

    /// Serialize with 4-space indentation
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only ever emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Key presence is what counts, even for an empty attribute map
    pub fn contains(&self, video_id: &str) -> bool {
        self.entries.contains_key(video_id)
    }

    pub fn get(&self, video_id: &str) -> Option<&AttributeMap> {
        self.entries.get(video_id)
    }

    pub fn insert(&mut self, video_id: impl Into<String>, attributes: AttributeMap) -> Option<AttributeMap> {
        self.entries.insert(video_id.into(), attributes)
    }

    pub fn remove(&mut self, video_id: &str) -> Option<AttributeMap> {
        self.entries.remove(video_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeMap)> {
        self.entries.iter()
    }

    /// Drop every entry whose attribute map is empty, returning the removed ids
    pub fn prune_empty(&mut self) -> Vec<String> {
        let empty: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, attributes)| attributes.is_empty())
            .map(|(id, _)| id.clone())
            .collect();

        for id in &empty {
            self.entries.remove(id);
        }
        empty
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_entries: self.entries.len(),
            empty_entries: self.entries.values().filter(|a| a.is_empty()).count(),
            total_attributes: self.entries.values().map(BTreeMap::len).sum(),
        }
    }
}

/// Handle on a store file path
#[derive(Debug, Clone, PartialEq)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<prefix><YYYYMMDD>.json`
    pub fn dated(dir: &Path, prefix: &str, date: NaiveDate) -> Self {
        let filename = format!("{}{}.json", prefix, date.format(STORE_DATE_FORMAT));
        Self::new(dir.join(filename))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Date encoded in the file name, if it follows the dated layout
    pub fn date(&self, prefix: &str) -> Option<NaiveDate> {
        let stem = self.path.file_stem()?.to_str()?;
        let stamp = stem.strip_prefix(prefix)?;
        NaiveDate::parse_from_str(stamp, STORE_DATE_FORMAT).ok()
    }

    /// Create the parent directory tree if absent
    pub async fn ensure_dir(&self) -> Result<()> {
        let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder
            .create(dir)
            .await
            .map_err(|e| CollectorError::io_at(dir, e))?;

        debug!("📁 Store directory ready: {}", dir.display());
        Ok(())
    }

    /// Open or create the store file and read it in full
    pub async fn load(&self) -> Result<MetadataStore> {
        self.ensure_dir().await?;

        let mut options = tokio::fs::OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        options.mode(0o644);
        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| CollectorError::io_at(&self.path, e))?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .await
            .map_err(|e| CollectorError::io_at(&self.path, e))?;

        let store = MetadataStore::from_slice(&contents, &self.path)?;
        info!("📚 Loaded {} entries from {}", store.len(), self.path.display());
        Ok(store)
    }

    /// Read an existing store file without creating anything
    pub async fn read_existing(&self) -> Result<MetadataStore> {
        let contents = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CollectorError::io_at(&self.path, e))?;
        MetadataStore::from_slice(&contents, &self.path)
    }

    /// Replace the file's contents with the full store. The new content is
    /// written to a sibling temp file and renamed over the store file.
    pub async fn flush(&self, store: &MetadataStore) -> Result<()> {
        let json = store.to_json_pretty()?;
        let tmp_path = self.tmp_path();

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o644);
        let mut file = options
            .open(&tmp_path)
            .await
            .map_err(|e| CollectorError::io_at(&tmp_path, e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| CollectorError::io_at(&tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| CollectorError::io_at(&tmp_path, e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| CollectorError::io_at(&self.path, e))?;

        debug!("💾 Flushed {} entries to {}", store.len(), self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

/// Today's date for store file naming
pub fn store_date(use_utc: bool) -> NaiveDate {
    if use_utc {
        Utc::now().date_naive()
    } else {
        Local::now().date_naive()
    }
}

/// Parse a `YYYYMMDD` date
pub fn parse_store_date(stamp: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(stamp, STORE_DATE_FORMAT)
        .map_err(|e| CollectorError::Config(format!("invalid store date {:?}: {}", stamp, e)))
}

/// Dated store files directly under `dir`, oldest first
pub fn discover_store_files(dir: &Path, prefix: &str) -> Result<Vec<StoreFile>> {
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let store_file = StoreFile::new(entry.path());
        if entry.path().extension().map_or(false, |ext| ext == "json")
            && store_file.date(prefix).is_some()
        {
            files.push(store_file);
        }
    }

    files.sort_by_key(|f| f.date(prefix));
    Ok(files)
}
