use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// Reads a cache file. Missing, unreadable and corrupt files all count as a
/// cache miss.
pub fn load_cache(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cache file unreadable; treating as miss");
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cache file corrupt; treating as miss");
            None
        }
    }
}

pub fn save_cache(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache directory {}", parent.display()))?;
    }

    let serialized = serde_json::to_string_pretty(value)?;
    std::fs::write(path, serialized)
        .with_context(|| format!("failed to write cache file {}", path.display()))?;
    Ok(())
}
