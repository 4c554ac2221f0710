/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Suite and scenario definitions: what a suite run wants from the pool.
//!
//! A suite file declares its requirements; scenario files refine them and are
//! combined onto the suite in the order given:
//!
//! ```yaml
//! resources:
//!   modem:
//!     - times: 2
//!       features: [sms]
//!   bts:
//!     - type: osmo-bts-sysmo
//! modifiers:
//!   bts:
//!     - label: under-test
//! defaults:
//!   timeout: 60s
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{self, ConfigError, ConfigValue};
use crate::resource::Resources;
use crate::schema::SchemaRegistry;

#[derive(Debug, Clone)]
pub struct SuiteDefinition {
    name: String,
    path: PathBuf,
    config: ConfigValue,
    resources: Resources,
    modifiers: Resources,
}

impl SuiteDefinition {
    /// Load the suite at `path` and combine `scenarios` onto it.
    ///
    /// # Errors
    /// I/O and YAML errors, combine conflicts between suite and scenarios,
    /// schema violations of the combined result and invalid `times`.
    pub fn load(
        path: &Path,
        scenarios: &[PathBuf],
        registry: &SchemaRegistry,
    ) -> Result<Self, ConfigError> {
        let mut combined = config::read(path, None)?;
        for scenario in scenarios {
            debug!(suite = %path.display(), scenario = %scenario.display(), "applying scenario");
            let overlay = config::read(scenario, None)?;
            config::combine(&mut combined, overlay)?;
        }
        registry.suite_schema()?.validate(&combined)?;

        let resources = section(&combined, "resources")?;
        let modifiers = section(&combined, "modifiers")?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            path: path.to_path_buf(),
            config: combined,
            resources,
            modifiers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The combined suite configuration.
    pub fn config(&self) -> &ConfigValue {
        &self.config
    }

    /// Requested resources with `times` expanded.
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn modifiers(&self) -> &Resources {
        &self.modifiers
    }
}

fn section(config: &ConfigValue, key: &str) -> Result<Resources, ConfigError> {
    match config.lookup(key) {
        Some(value) => Resources::from_config(&config::replicate_times(value)?),
        None => Ok(Resources::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn times_are_expanded() {
        let tmp = TempDir::new().unwrap();
        let suite = write(
            &tmp,
            "smoke.conf",
            "resources:\n  modem:\n    - times: 3\n      type: ofono\n",
        );
        let registry = SchemaRegistry::builtin().unwrap();
        let def = SuiteDefinition::load(&suite, &[], &registry).unwrap();

        assert_eq!(def.name(), "smoke");
        let modems = def.resources().get("modem").unwrap();
        assert_eq!(modems.len(), 3);
        for modem in modems {
            assert_eq!(modem.get("type"), Some(&ConfigValue::from("ofono")));
            assert!(!modem.contains_key("times"));
        }
        assert!(def.modifiers().is_empty());
    }

    #[test]
    fn scenarios_combine_onto_suite() {
        let tmp = TempDir::new().unwrap();
        let suite = write(
            &tmp,
            "suite.conf",
            "resources:\n  bts:\n    - type: osmo-bts-sysmo\n  modem:\n    - features: [sms]\n",
        );
        let scenario = write(
            &tmp,
            "voice.conf",
            "resources:\n  modem:\n    - features: [voice]\nmodifiers:\n  bts:\n    - label: dut\n",
        );
        let registry = SchemaRegistry::builtin().unwrap();
        let def = SuiteDefinition::load(&suite, &[scenario], &registry).unwrap();

        let modem = &def.resources().get("modem").unwrap()[0];
        assert_eq!(
            modem.get("features"),
            Some(&ConfigValue::Sequence(vec!["sms".into(), "voice".into()]))
        );
        assert_eq!(def.modifiers().count("bts"), 1);
    }

    #[test]
    fn conflicting_scenario_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let suite = write(&tmp, "suite.conf", "resources:\n  bts:\n    - type: a\n");
        let scenario = write(&tmp, "other.conf", "resources:\n  bts:\n    - type: b\n");
        let registry = SchemaRegistry::builtin().unwrap();
        let err = SuiteDefinition::load(&suite, &[scenario], &registry).unwrap_err();
        assert!(matches!(err, ConfigError::Conflict { .. }));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let suite = write(&tmp, "suite.conf", "resources:\n  modem:\n    - colour: red\n");
        let registry = SchemaRegistry::builtin().unwrap();
        let err = SuiteDefinition::load(&suite, &[], &registry).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }
}
