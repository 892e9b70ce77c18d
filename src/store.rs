// src/store.rs
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Mutex;

#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist `content` under `name`; returns where it landed.
    async fn store(&self, name: &str, content: &str) -> Result<String>;
}

/// Writes artifacts into a directory, creating it on first use.
pub struct FsArtifactSink {
    dir: PathBuf,
}

impl FsArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl ArtifactSink for FsArtifactSink {
    async fn store(&self, name: &str, content: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create output dir {}", self.dir.display()))?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("write artifact {}", path.display()))?;
        Ok(path.display().to_string())
    }
}

// --- Test helper ---
#[derive(Default)]
pub struct MemorySink {
    pub stored: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ArtifactSink for MemorySink {
    async fn store(&self, name: &str, content: &str) -> Result<String> {
        self.stored
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink poisoned"))?
            .push((name.to_string(), content.to_string()));
        Ok(format!("memory://{name}"))
    }
}
