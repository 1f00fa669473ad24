//! Durable snapshot of the node table.
//!
//! A single JSON file mapping address keys to node records, replaced
//! atomically via a temp file and rename so a partial write can never
//! clobber a good snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{SeederError, SeederResult};
use crate::manager::node::Node;

/// Name of the snapshot file inside the data directory.
pub const NODES_FILENAME: &str = "nodes.json";

/// Load the node table from `path`.
///
/// A missing file is an empty table. A file that exists but cannot be read
/// or decoded is removed so operation resumes from a clean slate; load
/// never fails.
pub async fn load_nodes(path: &Path) -> HashMap<String, Node> {
    match read_nodes(path).await {
        Ok(Some(nodes)) => {
            tracing::info!(count = nodes.len(), path = ?path, "Loaded nodes from snapshot");
            nodes
        }
        Ok(None) => HashMap::new(),
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Failed to parse snapshot, removing it");
            if let Err(e) = fs::remove_file(path).await {
                tracing::warn!(path = ?path, error = %e, "Failed to remove corrupt snapshot");
            }
            HashMap::new()
        }
    }
}

async fn read_nodes(path: &Path) -> SeederResult<Option<HashMap<String, Node>>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).await?;
    let nodes =
        serde_json::from_str(&contents).map_err(|e| SeederError::Snapshot(e.to_string()))?;
    Ok(Some(nodes))
}

/// Write an already-serialized table to `path` via `<path>.new` and an
/// atomic rename.
pub async fn save_nodes(path: &Path, contents: &str) -> SeederResult<()> {
    let temp_path = temp_path_for(path);

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".new");
    PathBuf::from(temp)
}
