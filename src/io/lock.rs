use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ensure_profile_exists, read_json, sha256_file, write_json};
use crate::error::PipelineError;
use crate::stages::DEFAULT_TEMPLATE;

pub const LOCK_MANIFEST_FILE: &str = "lock_manifest.json";
pub const LOCKED_PROFILE_FILE: &str = "profile.json";
pub const DEFAULT_TEMPLATE_FILE: &str = "requirements.md.hbs";

/// Model settings frozen with the lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockSettings {
    pub model: String,
    pub temperature: f64,
}

/// `lock_manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockManifest {
    pub created_at: String,
    pub profile_file: String,
    pub template_file: String,
    pub profile_sha256: String,
    pub template_sha256: String,
    pub settings: LockSettings,
}

/// A lock directory with its files resolved to paths
#[derive(Debug, Clone)]
pub struct ResolvedLock {
    pub dir: PathBuf,
    pub profile_path: PathBuf,
    pub template_path: PathBuf,
    pub manifest: LockManifest,
}

/// Freeze profile, template and settings into `lock_dir` (tune mode).
///
/// The profile is bootstrapped first if it does not exist. Without a
/// template, the built-in default template is frozen.
pub fn create_lock(
    lock_dir: &Path,
    profile_path: &Path,
    template_path: Option<&Path>,
    settings: LockSettings,
) -> Result<ResolvedLock> {
    std::fs::create_dir_all(lock_dir)
        .with_context(|| format!("Failed to create lock directory: {:?}", lock_dir))?;

    ensure_profile_exists(profile_path)?;
    let locked_profile = lock_dir.join(LOCKED_PROFILE_FILE);
    std::fs::copy(profile_path, &locked_profile)
        .with_context(|| format!("Failed to copy profile {:?} into lock", profile_path))?;

    let locked_template = match template_path {
        Some(template) => {
            let name = template
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_TEMPLATE_FILE.to_string());
            let dest = lock_dir.join(name);
            std::fs::copy(template, &dest)
                .with_context(|| format!("Failed to copy template {:?} into lock", template))?;
            dest
        }
        None => {
            let dest = lock_dir.join(DEFAULT_TEMPLATE_FILE);
            std::fs::write(&dest, DEFAULT_TEMPLATE)
                .with_context(|| format!("Failed to write template: {:?}", dest))?;
            dest
        }
    };

    let manifest = LockManifest {
        created_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        profile_file: LOCKED_PROFILE_FILE.to_string(),
        template_file: file_name(&locked_template),
        profile_sha256: sha256_file(&locked_profile)?,
        template_sha256: sha256_file(&locked_template)?,
        settings,
    };
    write_json(&lock_dir.join(LOCK_MANIFEST_FILE), &manifest)?;

    info!("Locked profile and template into {:?}", lock_dir);

    Ok(ResolvedLock {
        dir: lock_dir.to_path_buf(),
        profile_path: locked_profile,
        template_path: locked_template,
        manifest,
    })
}

/// Resolve an existing lock directory (eval mode).
///
/// Missing files are configuration errors. A checksum that no longer
/// matches the manifest is reported but not fatal.
pub fn resolve_lock(lock_dir: &Path) -> Result<ResolvedLock> {
    let manifest_path = lock_dir.join(LOCK_MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(PipelineError::Config(format!(
            "lock manifest not found: {:?}",
            manifest_path
        ))
        .into());
    }
    let manifest: LockManifest = read_json(&manifest_path)?;

    let profile_path = lock_dir.join(&manifest.profile_file);
    let template_path = lock_dir.join(&manifest.template_file);
    for (kind, path) in [("profile", &profile_path), ("template", &template_path)] {
        if !path.exists() {
            return Err(
                PipelineError::Config(format!("locked {} not found: {:?}", kind, path)).into(),
            );
        }
    }

    for (kind, path, expected) in [
        ("profile", &profile_path, &manifest.profile_sha256),
        ("template", &template_path, &manifest.template_sha256),
    ] {
        if sha256_file(path)? != *expected {
            warn!("Locked {} {:?} changed since the lock was created", kind, path);
        }
    }

    Ok(ResolvedLock {
        dir: lock_dir.to_path_buf(),
        profile_path,
        template_path,
        manifest,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
