//! On-disk metadata document: one pretty-printed JSON object keyed by id.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, ShellcraftError};
use crate::record::Record;

/// In-memory form of `metadata.json`.
pub type Document = BTreeMap<String, Record>;

/// Read the document. A missing file is an empty store; an unparseable
/// one is an error and is left untouched on disk.
pub fn load(path: &Path) -> Result<Document> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(e) => {
            return Err(ShellcraftError::Store(format!(
                "failed to read {}: {e}",
                path.display()
            )));
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| {
        ShellcraftError::Store(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Atomically replace the document.
///
/// Writes a temp file next to it, fsyncs, then renames, so concurrent
/// readers see either the old or the new version.
pub fn save(path: &Path, document: &Document) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ShellcraftError::Store(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let json = serde_json::to_string_pretty(document)
        .map_err(|e| ShellcraftError::Store(format!("failed to serialize metadata: {e}")))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| {
        ShellcraftError::Store(format!(
            "failed to write temp file {}: {e}",
            tmp_path.display()
        ))
    })?;

    if let Ok(file) = std::fs::File::open(&tmp_path) {
        let _ = file.sync_all();
    }

    std::fs::rename(&tmp_path, path).map_err(|e| {
        ShellcraftError::Store(format!(
            "failed to rename temp file to {}: {e}",
            path.display()
        ))
    })?;
    Ok(())
}
