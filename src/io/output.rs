use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveTime};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Where a text output actually landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// True when the requested path could not be replaced and an
    /// alternate name was used instead
    pub substituted: bool,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    Ok(())
}

/// Write pretty JSON, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, value).context("Failed to write JSON")?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {:?}", path))
}

/// Write text via a temporary file and rename it into place.
///
/// If the destination cannot be replaced (typically because it is open in
/// another program), the result is kept under `<stem>.<HHMMSS>.<ext>`.
pub fn safe_write_text(path: &Path, text: &str) -> Result<WrittenFile> {
    ensure_parent(path)?;

    let tmp = tmp_path(path);
    std::fs::write(&tmp, text).with_context(|| format!("Failed to write file: {:?}", tmp))?;

    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(WrittenFile {
            path: path.to_path_buf(),
            substituted: false,
        }),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            let alt = alternate_path(path, Local::now().time());
            std::fs::rename(&tmp, &alt)
                .with_context(|| format!("Failed to write alternate file: {:?}", alt))?;
            warn!("Could not replace {:?} (open elsewhere?); wrote {:?} instead", path, alt);
            Ok(WrittenFile {
                path: alt,
                substituted: true,
            })
        }
        Err(e) => Err(e).with_context(|| format!("Failed to move {:?} to {:?}", tmp, path)),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn alternate_path(path: &Path, time: NaiveTime) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let stamp = time.format("%H%M%S");
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}.{}", stem, stamp),
    };
    path.with_file_name(name)
}
