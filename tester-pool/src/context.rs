/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Process-wide context: schema registry plus resource pool.
//!
//! Built once with [`Context::init`] at process start and passed to whoever
//! needs the pool.  [`Context::shutdown`] releases every reservation that
//! was not freed explicitly; it also runs when the context is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::info;

use crate::config::main::MainConfig;
use crate::origin::{Origin, RunOrigin};
use crate::resource::{ReservedResources, ResourcePool};
use crate::schema::SchemaRegistry;
use crate::state::StateDir;
use crate::suite::SuiteDefinition;

pub struct Context {
    config: MainConfig,
    registry: SchemaRegistry,
    pool: Arc<ResourcePool>,
}

impl Context {
    /// Build the schema registry and load the resource catalog.
    pub fn init(config: MainConfig) -> Result<Self> {
        let registry = SchemaRegistry::builtin().context("Failed to build resource schema")?;
        let pool = ResourcePool::load(
            &config.resource_conf,
            StateDir::new(&config.state_dir),
            &registry,
        )
        .with_context(|| {
            format!(
                "Failed to load resources from: {}",
                config.resource_conf.display()
            )
        })?;

        Ok(Self {
            config,
            registry,
            pool: Arc::new(pool),
        })
    }

    pub fn config(&self) -> &MainConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    pub fn load_suite(&self, path: &Path, scenarios: &[PathBuf]) -> Result<SuiteDefinition> {
        SuiteDefinition::load(path, scenarios, &self.registry)
            .with_context(|| format!("Failed to load suite: {}", path.display()))
    }

    /// Reserve everything `suite` asks for under a fresh origin.
    pub fn reserve_suite(&self, suite: &SuiteDefinition) -> Result<ReservedResources> {
        let origin: Arc<dyn Origin> = Arc::new(RunOrigin::new(suite.name()));
        let reserved = self
            .pool
            .reserve(Arc::clone(&origin), suite.resources(), suite.modifiers())
            .with_context(|| format!("Failed to reserve resources for suite {}", suite.name()))?;
        Ok(reserved)
    }

    /// Release everything still reserved through this context.
    pub fn shutdown(&self) {
        let outstanding = self.pool.outstanding();
        if !outstanding.is_empty() {
            info!(origins = ?outstanding, "releasing reservations at shutdown");
        }
        self.pool.shutdown();
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(tmp: &TempDir) -> Context {
        let conf = tmp.path().join("resources.conf");
        std::fs::write(
            &conf,
            "modem:\n  - imsi: '901700000000001'\n  - imsi: '901700000000002'\n",
        )
        .unwrap();
        Context::init(MainConfig {
            state_dir: tmp.path().join("state"),
            resource_conf: conf,
        })
        .unwrap()
    }

    #[test]
    fn reserve_suite_and_shutdown() {
        let tmp = TempDir::new().unwrap();
        let ctx = setup(&tmp);
        let suite_path = tmp.path().join("suite.conf");
        std::fs::write(&suite_path, "resources:\n  modem:\n    - times: 2\n").unwrap();

        let suite = ctx.load_suite(&suite_path, &[]).unwrap();
        let reserved = ctx.reserve_suite(&suite).unwrap();
        assert_eq!(reserved.count("modem"), 2);
        assert_eq!(ctx.pool().outstanding().len(), 1);

        ctx.shutdown();
        assert!(ctx.pool().reserved_state().unwrap().is_empty());
    }

    #[test]
    fn missing_catalog_fails_init() {
        let tmp = TempDir::new().unwrap();
        let result = Context::init(MainConfig {
            state_dir: tmp.path().join("state"),
            resource_conf: tmp.path().join("absent.conf"),
        });
        assert!(result.is_err());
    }
}
