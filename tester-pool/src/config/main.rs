//! Main configuration: where the resource catalog and the shared state live.
//!
//! The expected YAML structure is:
//! ```yaml
//! state_dir: /var/tmp/tester-state
//! resource_conf: resources.conf
//! ```
//!
//! Relative paths are resolved against the directory containing the main
//! configuration file, so a lab setup can be kept together in one directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Default location of the shared state directory (reservations, counters,
/// lock file).
pub const DEFAULT_STATE_DIR: &str = "/var/tmp/tester-state";

/// Default name of the resources catalog, relative to the main config.
pub const DEFAULT_RESOURCE_CONF: &str = "resources.conf";

// ── Private YAML deserialization types ────────────────────────────────────────

/// Fields as they appear in the YAML file; every key is optional.
#[derive(Debug, Default, Deserialize)]
struct MainConfigFile {
    state_dir: Option<PathBuf>,
    resource_conf: Option<PathBuf>,
}

// ── Public data structures ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainConfig {
    /// Directory shared by every test-suite process using the same pool.
    pub state_dir: PathBuf,
    /// YAML catalog of all resources in the lab.
    pub resource_conf: PathBuf,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            resource_conf: PathBuf::from(DEFAULT_RESOURCE_CONF),
        }
    }
}

impl MainConfig {
    /// Parse the main configuration file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading main configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: MainConfigFile = if content.trim().is_empty() {
            MainConfigFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let defaults = Self::default();
        let config = Self {
            state_dir: resolve(base, file.state_dir.unwrap_or(defaults.state_dir)),
            resource_conf: resolve(base, file.resource_conf.unwrap_or(defaults.resource_conf)),
        };

        debug!(
            state_dir = %config.state_dir.display(),
            resource_conf = %config.resource_conf.display(),
            "main configuration resolved"
        );
        Ok(config)
    }
}

fn resolve(base: &Path, p: PathBuf) -> PathBuf {
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
