use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{LockManifest, write_json};

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to hash file: {:?}", path))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Wall-clock time spent in each stage, in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub classify_sec: f64,
    pub normalize_sec: f64,
    pub reconcile_sec: f64,
    pub render_sec: f64,
    pub total_sec: f64,
}

impl StageTimings {
    pub fn summary(&self) -> String {
        format!(
            "classify {}, normalize {}, reconcile {}, render {}, total {}",
            fmt_sec(self.classify_sec),
            fmt_sec(self.normalize_sec),
            fmt_sec(self.reconcile_sec),
            fmt_sec(self.render_sec),
            fmt_sec(self.total_sec)
        )
    }
}

pub fn secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

/// Format seconds as `12.345s` or `2m 3.500s`
pub fn fmt_sec(sec: f64) -> String {
    if sec < 60.0 {
        return format!("{:.3}s", sec);
    }
    let minutes = (sec / 60.0).floor();
    format!("{}m {:.3}s", minutes as u64, sec - minutes * 60.0)
}

/// Per-run record for reproducibility auditing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub mode: String,
    pub input: PathBuf,
    pub input_sha256: String,
    pub output_md: PathBuf,
    pub output_substituted: bool,
    pub classified: PathBuf,
    pub normalized: PathBuf,
    pub lock_dir: Option<PathBuf>,
    pub lock_manifest: Option<LockManifest>,
    pub model: String,
    pub temperature: f64,
    pub profile_sha256: String,
    pub template_sha256: String,
    pub counts: RunCounts,
    pub timing: StageTimings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub utterances: usize,
    pub records: usize,
    pub fr: usize,
    pub nfr: usize,
    pub dec: usize,
    pub out_of_scope: usize,
}

impl RunManifest {
    pub fn write(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fmt_sec() {
        assert_eq!(fmt_sec(1.5), "1.500s");
        assert_eq!(fmt_sec(125.25), "2m 5.250s");
    }
}
