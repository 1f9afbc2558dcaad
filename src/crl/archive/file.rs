use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ring::digest;
use tokio::fs;
use tracing::{debug, info};

use super::{Result, SnapshotArchive};
use crate::crl::types::SnapshotId;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const TIMESTAMP_LEN: usize = 14;
const EXTENSION: &str = ".crl";
/// Hex digits of the URL digest appended to directory names.
const URL_HASH_LEN: usize = 12;

/// Archives CRLs as `<id>-<YYYYmmddHHMMSS>.crl` files in a directory.
///
/// The timestamp is the (UTC) time of archival. The same identifier may be
/// archived more than once; `load` returns the most recent copy.
#[derive(Debug, Clone)]
pub struct FileArchive {
    base_path: PathBuf,
}

impl FileArchive {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Archive rooted in a per distribution point subdirectory of `root`.
    pub fn for_distribution_point(root: &Path, distribution_point: &str) -> Self {
        Self::new(root.join(directory_name(distribution_point)))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_name(id: &SnapshotId, saved_at: DateTime<Utc>) -> String {
        format!("{id}-{}{EXTENSION}", saved_at.format(TIMESTAMP_FORMAT))
    }

    fn matches(id_prefix: &str, file_name: &str) -> bool {
        file_name
            .strip_prefix(id_prefix)
            .and_then(|rest| rest.strip_suffix(EXTENSION))
            .is_some_and(is_timestamp)
    }

    /// Archival timestamp and identifier of an archive file name.
    fn split_name(file_name: &str) -> Option<(&str, &str)> {
        let (id, stamp) = file_name.strip_suffix(EXTENSION)?.rsplit_once('-')?;
        (!id.is_empty() && is_timestamp(stamp)).then_some((stamp, id))
    }

    async fn file_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !fs::try_exists(&self.base_path).await? {
            return Ok(names);
        }

        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_owned());
            }
        }
        Ok(names)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let raw = fs::read(self.base_path.join(name)).await?;
        debug!("Loaded archived CRL {}", name);
        Ok(raw)
    }
}

fn is_timestamp(stamp: &str) -> bool {
    stamp.len() == TIMESTAMP_LEN && stamp.bytes().all(|b| b.is_ascii_digit())
}

#[async_trait]
impl SnapshotArchive for FileArchive {
    async fn save(&self, id: &SnapshotId, raw: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;

        let path = self.base_path.join(Self::file_name(id, Utc::now()));
        fs::write(&path, raw).await?;

        info!("Saved CRL to {}", path.display());
        Ok(())
    }

    async fn load(&self, id: &SnapshotId) -> Result<Option<Vec<u8>>> {
        let prefix = format!("{id}-");
        // Fixed-width timestamps sort lexicographically.
        let newest = self
            .file_names()
            .await?
            .into_iter()
            .filter(|name| Self::matches(&prefix, name))
            .max();

        match newest {
            Some(name) => Ok(Some(self.read(&name).await?)),
            None => {
                debug!("No archived CRL for {} in {}", id, self.base_path.display());
                Ok(None)
            }
        }
    }

    async fn load_latest(&self) -> Result<Option<Vec<u8>>> {
        let names = self.file_names().await?;
        // Saves within the same second go to the longer, then greater, identifier.
        let newest = names
            .iter()
            .filter_map(|name| Self::split_name(name).map(|(stamp, id)| (stamp, id.len(), id, name)))
            .max()
            .map(|(.., name)| name);

        match newest {
            Some(name) => Ok(Some(self.read(name).await?)),
            None => Ok(None),
        }
    }
}

/// Readable form of the URL followed by a digest of the full URL, so URLs
/// that only differ in punctuation get separate directories.
fn directory_name(distribution_point: &str) -> String {
    let without_scheme = distribution_point
        .split_once("://")
        .map_or(distribution_point, |(_, rest)| rest);

    let readable = without_scheme
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect::<String>();
    let hash = hex::encode(digest::digest(&digest::SHA256, distribution_point.as_bytes()));

    format!("{}-{}", readable.trim_matches('_'), &hash[..URL_HASH_LEN])
}
