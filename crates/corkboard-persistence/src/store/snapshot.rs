use chrono::{DateTime, Utc};
use corkboard_core::{CorkboardError, CorkboardResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub instance_id: Uuid,
    pub saved_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct WriteEnvelope<'a, T: Serialize> {
    version: u32,
    metadata: SnapshotMetadata,
    data: &'a T,
}

#[derive(Deserialize)]
struct ReadEnvelope<T> {
    version: u32,
    metadata: SnapshotMetadata,
    data: T,
}

/// Serialize `data` into a versioned envelope and write it via
/// write-to-temp-file then atomic rename, so a crash mid-write cannot leave
/// a truncated snapshot behind.
pub async fn write_snapshot<T: Serialize>(
    path: &Path,
    instance_id: Uuid,
    data: &T,
) -> CorkboardResult<()> {
    let envelope = WriteEnvelope {
        version: SNAPSHOT_VERSION,
        metadata: SnapshotMetadata {
            instance_id,
            saved_at: Utc::now(),
        },
        data,
    };
    let bytes = serde_json::to_vec_pretty(&envelope)
        .map_err(|e| CorkboardError::Serialization(e.to_string()))?;

    // Temp file in the same directory so the rename stays on one filesystem.
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_file = tempfile::NamedTempFile::new_in(parent)?;
    let temp_path = temp_file.path().to_path_buf();
    fs::write(&temp_path, &bytes).await?;
    fs::rename(&temp_path, path).await?;

    tracing::debug!("Wrote {} byte snapshot to {}", bytes.len(), path.display());
    Ok(())
}

pub async fn read_snapshot<T: DeserializeOwned>(
    path: &Path,
) -> CorkboardResult<(T, SnapshotMetadata)> {
    let bytes = fs::read(path).await?;
    let envelope: ReadEnvelope<T> = serde_json::from_slice(&bytes)
        .map_err(|e| CorkboardError::Serialization(e.to_string()))?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(CorkboardError::Serialization(format!(
            "Unsupported snapshot version: {}",
            envelope.version
        )));
    }
    tracing::debug!("Read {} byte snapshot from {}", bytes.len(), path.display());
    Ok((envelope.data, envelope.metadata))
}
