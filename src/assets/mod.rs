//! Protected file lookup.
//!
//! Resource ids are single file names inside the configured root. Anything
//! that could address a different directory resolves to
//! [`AuthError::NotFound`], the same as a missing file.

use std::path::{Component, Path, PathBuf};

use crate::auth::{AuthError, AuthResult};

pub mod config;

pub use config::AssetConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(config.root.clone())
    }

    pub async fn resolve(&self, resource_id: &str) -> AuthResult<AssetHandle> {
        if !is_plain_file_name(resource_id) {
            log::debug!("rejecting asset id {:?}", resource_id);
            return Err(AuthError::NotFound);
        }

        let path = self.root.join(resource_id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(AssetHandle {
                name: resource_id.to_string(),
                path,
            }),
            Ok(_) => Err(AuthError::NotFound),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AuthError::NotFound),
            Err(err) => Err(AuthError::Io(err)),
        }
    }
}

fn is_plain_file_name(resource_id: &str) -> bool {
    if resource_id.is_empty() || resource_id.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(resource_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
