//! Static UI files served from a directory on disk.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::application::{AssetError, AssetStore};

/// [`AssetStore`] reading `<root>/<name>`.
///
/// Names come from the router's fixed table, never from the request path.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetStore for DirAssetStore {
    async fn load(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        tokio::fs::read(self.root.join(name))
            .await
            .map_err(|source| AssetError::Unavailable {
                name: name.to_string(),
                source,
            })
    }
}
