use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::Tables;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    created_ms: i64,
    tables: &'a Tables,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    #[allow(dead_code)]
    created_ms: i64,
    tables: Tables,
}

pub(super) fn snapshot_path(dir: &Path) -> PathBuf { dir.join("membership.json") }

pub(super) fn encode(tables: &Tables) -> anyhow::Result<Vec<u8>> {
    let created_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
    let snap = SnapshotRef { version: SNAPSHOT_VERSION, created_ms, tables };
    Ok(serde_json::to_vec(&snap)?)
}

/// Write to a temp file then rename over the live snapshot.
pub(super) fn write_atomic(dir: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let path = snapshot_path(dir);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

pub(super) fn load(dir: &Path) -> anyhow::Result<Option<Tables>> {
    let path = snapshot_path(dir);
    if !path.exists() { return Ok(None); }
    let bytes = std::fs::read(&path)?;
    let snap: Snapshot = serde_json::from_slice(&bytes)?;
    if snap.version != SNAPSHOT_VERSION {
        anyhow::bail!("unsupported snapshot version {} in {:?}", snap.version, path);
    }
    Ok(Some(snap.tables))
}
