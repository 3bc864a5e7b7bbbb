use super::PipelineConfig;
use crate::error::{Result, TallyError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Builds a [`PipelineConfig`] from an optional file plus environment overrides
#[derive(Debug)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            path: None,
            use_env: true,
        }
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skip `DONOR_TALLY_*` environment overrides
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load, apply overrides and validate
    pub async fn load(&self) -> Result<PipelineConfig> {
        let mut config = match &self.path {
            Some(path) => load_file(path).await?,
            None => PipelineConfig::default(),
        };

        if self.use_env {
            config.merge_env_vars()?;
        }

        config.validate()?;
        debug!(?config, "Loaded pipeline configuration");
        Ok(config)
    }
}

/// Parse a TOML configuration document
pub fn from_toml_str(content: &str) -> Result<PipelineConfig> {
    Ok(toml::from_str(content)?)
}

pub async fn load_file(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| TallyError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
    from_toml_str(&content)
}
