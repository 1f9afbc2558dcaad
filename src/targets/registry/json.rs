use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use super::{Result, TargetRegistry};
use crate::targets::TargetRecord;

/// Targets stored as a JSON array of records in a single file.
#[derive(Debug, Clone)]
pub struct JsonTargetRegistry {
    path: PathBuf,
}

impl JsonTargetRegistry {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TargetRegistry for JsonTargetRegistry {
    async fn load_targets(&self) -> Result<Vec<TargetRecord>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No target registry at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let targets: Vec<TargetRecord> = serde_json::from_slice(&raw)?;
        debug!(
            "Loaded {} targets from {}",
            targets.len(),
            self.path.display()
        );
        Ok(targets)
    }

    async fn save_targets(&self, targets: &[TargetRecord]) -> Result<()> {
        let json = serde_json::to_vec_pretty(targets)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        // Write aside then rename so readers never see a partial file.
        let temp_path = self.temp_path();
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;

        info!(
            "Saved {} targets to {}",
            targets.len(),
            self.path.display()
        );
        Ok(())
    }
}
