use std::env;
use std::path::PathBuf;

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Location of the files served behind authentication.
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub root: PathBuf,
}

impl AssetConfig {
    pub fn from_env() -> Self {
        Self {
            root: PathBuf::from(env_string("ASSETS_DIR", "./assets")),
        }
    }
}
