use crate::types::PlayerId;
use std::io;
use std::path::{Path, PathBuf};

/// Durable local record of which player this client is, so a restart
/// rejoins the same record instead of enrolling a new one.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    path: PathBuf,
}

impl LocalIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> io::Result<Option<PlayerId>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let id = content.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, player_id: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, player_id).await
    }

    /// Forget the stored identity, e.g. after the record was removed
    pub async fn clear(&self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
