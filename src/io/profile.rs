use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{read_json, write_json};
use crate::models::Profile;

/// Write the default profile if `path` does not exist yet.
///
/// Returns true when a new file was written.
pub fn ensure_profile_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_default_profile(path)?;
    Ok(true)
}

/// Write the default profile, overwriting any existing file
pub fn write_default_profile(path: &Path) -> Result<()> {
    write_json(path, &Profile::default())
        .with_context(|| format!("Failed to write default profile: {:?}", path))?;
    info!("Wrote default profile to {:?}", path);
    Ok(())
}

/// Load the profile, bootstrapping the default on first use
pub fn load_profile(path: &Path) -> Result<Profile> {
    ensure_profile_exists(path)?;
    read_json(path).with_context(|| format!("Failed to load profile: {:?}", path))
}
