/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Shared resource pool: cross-process reservation of catalog items.
//!
//! The catalog is loaded once from the resources file.  The live reservations
//! of every process sharing the state directory are kept in
//! `reserved_resources.state`, always read and rewritten while holding the
//! [`StateLock`](crate::state::StateLock).
//!
//! ```text
//! reserve(origin, want, modifiers)
//!   validate ─► lock ─► read state ─► catalog.without(state) ─► find(want)
//!     ─► mark _reserved_by ─► state.add() ─► write state ─► unlock
//!     ─► remember for shutdown ─► ReservedResources
//! ```
//!
//! Reservations not freed explicitly are tracked in the pool and released by
//! [`ResourcePool::shutdown`], which also runs on drop.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::config;
use crate::origin::Origin;
use crate::schema::{Schema, SchemaError, SchemaRegistry};
use crate::state::StateDir;

use super::{Counter, ReservedResources, ResourceError, Resources};

/// Reservation record inside the state directory.
pub const RESERVED_RESOURCES_FILE: &str = "reserved_resources.state";

/// Lock owner used for read-only inspection of the state.
const INSPECT_OWNER: &str = "inspect";

// ── Exit tracking ─────────────────────────────────────────────────────────────

/// Reservations made through this pool and not freed yet.
struct Outstanding {
    origin: Arc<dyn Origin>,
    resources: Resources,
}

#[derive(Default)]
struct ExitTracker {
    remember_to_free: BTreeMap<String, Outstanding>,
    /// Whether shutdown has anything to do.
    armed: bool,
}

/// One line of the state dump logged when a request cannot be met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KindUsage {
    pub kind: String,
    pub asked: usize,
    pub reserved: usize,
    pub pool: usize,
}

// ── ResourcePool ──────────────────────────────────────────────────────────────

pub struct ResourcePool {
    config_path: PathBuf,
    state_dir: StateDir,
    schema: Schema,
    all_resources: Resources,
    exit: Mutex<ExitTracker>,
}

impl ResourcePool {
    /// Load and validate the catalog at `resource_conf`.
    ///
    /// # Errors
    /// I/O, YAML and schema errors of the resources file.
    pub fn load(
        resource_conf: &Path,
        state_dir: StateDir,
        registry: &SchemaRegistry,
    ) -> Result<Self, ResourceError> {
        let schema = registry.resources_schema().clone();
        let raw = config::read(resource_conf, Some(&schema))?;
        let resources = Resources::from_config(&raw)?;
        let pool = Self::build(resource_conf.to_path_buf(), state_dir, schema, resources);
        info!(
            config = %pool.config_path.display(),
            state_dir = %pool.state_dir.path().display(),
            counts = ?pool.all_resources.counts(),
            "resource pool loaded"
        );
        Ok(pool)
    }

    /// Pool over an in-memory catalog.
    pub fn from_resources(resources: Resources, state_dir: StateDir, schema: Schema) -> Self {
        Self::build(PathBuf::new(), state_dir, schema, resources)
    }

    fn build(
        config_path: PathBuf,
        state_dir: StateDir,
        schema: Schema,
        mut all_resources: Resources,
    ) -> Self {
        all_resources.set_hashes();
        Self {
            config_path,
            state_dir,
            schema,
            all_resources,
            exit: Mutex::new(ExitTracker::default()),
        }
    }

    /// The full catalog, hashes included.
    pub fn all_resources(&self) -> &Resources {
        &self.all_resources
    }

    pub fn state_dir(&self) -> &StateDir {
        &self.state_dir
    }

    // ── Reservation ───────────────────────────────────────────────────────────

    /// Reserve items satisfying `want` exclusively for `origin`.
    ///
    /// Nothing is persisted unless every step succeeds.
    ///
    /// # Errors
    /// Schema errors for malformed `want` / `modifiers`, the "no resource"
    /// family when the request cannot be met, lock and I/O errors.
    pub fn reserve(
        self: &Arc<Self>,
        origin: Arc<dyn Origin>,
        want: &Resources,
        modifiers: &Resources,
    ) -> Result<ReservedResources, ResourceError> {
        self.schema.validate(&want.to_config())?;
        self.schema.validate(&modifiers.to_config())?;

        let (to_reserve, handle) = {
            let _lock = self.state_dir.lock(origin.origin_id())?;
            let path = self.state_dir.mk_parentdir(RESERVED_RESOURCES_FILE)?;
            let mut reserved = read_reserved(&path)?;

            let candidates = self.all_resources.without(&reserved);
            let mut to_reserve = match candidates.find(origin.as_ref(), want) {
                Ok(found) => found,
                Err(e) => {
                    if e.is_no_resource() {
                        self.dump_state(origin.as_ref(), want, &reserved);
                    }
                    return Err(e);
                }
            };
            to_reserve.mark_reserved_by(origin.origin_id());

            // Overlay first: a bad modifier must fail before anything is written.
            let handle = ReservedResources::new(
                Arc::clone(self),
                Arc::clone(&origin),
                to_reserve.clone(),
                modifiers,
            )?;

            reserved.add(&to_reserve)?;
            config::write(&path, &reserved.to_config())?;
            (to_reserve, handle)
        };

        info!(
            origin = %origin.origin_id(),
            counts = ?to_reserve.counts(),
            "reserved resources"
        );
        self.remember_to_free(origin, &to_reserve);
        Ok(handle)
    }

    /// Return `to_be_freed` (as reserved, before modifiers) to the pool.
    ///
    /// # Errors
    /// [`ResourceError::NotFound`] if an item is not in the reservation record.
    pub fn free(&self, origin: &dyn Origin, to_be_freed: &Resources) -> Result<(), ResourceError> {
        {
            let _lock = self.state_dir.lock(origin.origin_id())?;
            let path = self.state_dir.mk_parentdir(RESERVED_RESOURCES_FILE)?;
            let mut reserved = read_reserved(&path)?;
            reserved.drop(to_be_freed, true)?;
            config::write(&path, &reserved.to_config())?;
        }
        info!(
            origin = %origin.origin_id(),
            counts = ?to_be_freed.counts(),
            "freed resources"
        );
        self.forget_freed(origin.origin_id(), to_be_freed);
        Ok(())
    }

    /// Drop every persisted item owned by `origin_id`, e.g. left behind by a
    /// process that was killed.  Returns what was released.
    pub fn release_origin(&self, origin_id: &str) -> Result<Resources, ResourceError> {
        let released = {
            let _lock = self.state_dir.lock(origin_id)?;
            let path = self.state_dir.mk_parentdir(RESERVED_RESOURCES_FILE)?;
            let mut reserved = read_reserved(&path)?;
            let owned = reserved.reserved_by(origin_id);
            if !owned.is_empty() {
                reserved.drop(&owned, true)?;
                config::write(&path, &reserved.to_config())?;
            }
            owned
        };
        if released.is_empty() {
            warn!(origin = origin_id, "no resources reserved by origin");
        } else {
            info!(origin = origin_id, counts = ?released.counts(), "released resources of origin");
        }
        self.forget_freed(origin_id, &released);
        Ok(released)
    }

    /// Snapshot of the persisted reservations of all processes.
    pub fn reserved_state(&self) -> Result<Resources, ResourceError> {
        let _lock = self.state_dir.lock(INSPECT_OWNER)?;
        read_reserved(&self.state_dir.child(RESERVED_RESOURCES_FILE))
    }

    fn dump_state(&self, origin: &dyn Origin, want: &Resources, reserved: &Resources) {
        error!(origin = %origin.origin_id(), "cannot satisfy resource request");
        for usage in self.usage_report(want, reserved) {
            warn!(
                kind = %usage.kind,
                asked = usage.asked,
                reserved = usage.reserved,
                pool = usage.pool,
                "resource state"
            );
        }
    }

    /// Asked / already reserved / catalog counts for every kind in `want`.
    pub(crate) fn usage_report(&self, want: &Resources, reserved: &Resources) -> Vec<KindUsage> {
        want.kinds()
            .map(|kind| KindUsage {
                kind: kind.to_string(),
                asked: want.count(kind),
                reserved: reserved.count(kind),
                pool: self.all_resources.count(kind),
            })
            .collect()
    }

    // ── Exit tracking ─────────────────────────────────────────────────────────

    fn remember_to_free(&self, origin: Arc<dyn Origin>, reserved: &Resources) {
        let mut exit = self.exit.lock().unwrap_or_else(PoisonError::into_inner);
        let id = origin.origin_id().to_string();
        let entry = exit
            .remember_to_free
            .entry(id)
            .or_insert_with(|| Outstanding {
                origin,
                resources: Resources::new(),
            });
        if let Err(e) = entry.resources.add(reserved) {
            // Already persisted; only the shutdown bookkeeping is affected.
            warn!(error = %e, "failed to track reservation for shutdown");
        }
        if !exit.armed {
            debug!("armed shutdown release of reserved resources");
            exit.armed = true;
        }
    }

    fn forget_freed(&self, origin_id: &str, freed: &Resources) {
        let mut exit = self.exit.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = exit.remember_to_free.get_mut(origin_id) {
            // Items freed elsewhere are simply not tracked any more.
            let _ = entry.resources.drop(freed, false);
            if entry.resources.is_empty() {
                exit.remember_to_free.remove(origin_id);
            }
        }
        if exit.armed && exit.remember_to_free.is_empty() {
            debug!("nothing left to release at shutdown");
            exit.armed = false;
        }
    }

    /// Origin ids with reservations not freed yet.
    pub fn outstanding(&self) -> Vec<String> {
        let exit = self.exit.lock().unwrap_or_else(PoisonError::into_inner);
        exit.remember_to_free.keys().cloned().collect()
    }

    /// Free every reservation still tracked by this pool.  Safe to call more
    /// than once.
    pub fn shutdown(&self) {
        let pending = {
            let mut exit = self.exit.lock().unwrap_or_else(PoisonError::into_inner);
            if !exit.armed {
                return;
            }
            std::mem::take(&mut exit.remember_to_free)
        };
        for (id, outstanding) in pending {
            info!(origin = %id, "releasing leftover reservation");
            if let Err(e) = self.free(outstanding.origin.as_ref(), &outstanding.resources) {
                error!(origin = %id, error = %e, "failed to release reservation");
            }
        }
    }

    // ── Persistent counters ───────────────────────────────────────────────────

    /// Advance `counter` in the shared state and return the new value.
    ///
    /// # Errors
    /// [`ResourceError::NotAFile`] if the state path exists but is not a
    /// regular file; a schema error if the stored value is malformed.
    pub fn next_persistent_value(
        &self,
        counter: Counter,
        origin: &dyn Origin,
    ) -> Result<String, ResourceError> {
        let _lock = self.state_dir.lock(origin.origin_id())?;
        let path = self
            .state_dir
            .mk_parentdir(&format!("last_used_{}.state", counter.token()))?;
        let io_err = |source| ResourceError::Io {
            path: path.clone(),
            source,
        };

        let last = if path.exists() {
            if !path.is_file() {
                return Err(ResourceError::NotAFile { path: path.clone() });
            }
            std::fs::read_to_string(&path)
                .map_err(io_err)?
                .trim()
                .to_string()
        } else {
            counter.seed().to_string()
        };

        let invalid = |value: &str, reason: String| SchemaError::InvalidValue {
            path: path.display().to_string(),
            tag: counter.tag(),
            value: value.to_string(),
            reason,
        };
        counter.tag().check(&last).map_err(|r| invalid(&last, r))?;
        let next = counter.increment(&last).map_err(|r| invalid(&last, r))?;

        std::fs::write(&path, &next).map_err(io_err)?;
        debug!(
            origin = %origin.origin_id(),
            counter = %counter,
            value = %next,
            "advanced persistent counter"
        );
        Ok(next)
    }

    pub fn next_msisdn(&self, origin: &dyn Origin) -> Result<String, ResourceError> {
        self.next_persistent_value(Counter::Msisdn, origin)
    }

    pub fn next_lac(&self, origin: &dyn Origin) -> Result<String, ResourceError> {
        self.next_persistent_value(Counter::Lac, origin)
    }

    pub fn next_rac(&self, origin: &dyn Origin) -> Result<String, ResourceError> {
        self.next_persistent_value(Counter::Rac, origin)
    }

    pub fn next_cellid(&self, origin: &dyn Origin) -> Result<String, ResourceError> {
        self.next_persistent_value(Counter::CellId, origin)
    }

    pub fn next_bvci(&self, origin: &dyn Origin) -> Result<String, ResourceError> {
        self.next_persistent_value(Counter::Bvci, origin)
    }
}

impl Drop for ResourcePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("config_path", &self.config_path)
            .field("state_dir", &self.state_dir)
            .field("counts", &self.all_resources.counts())
            .finish()
    }
}

fn read_reserved(path: &Path) -> Result<Resources, ResourceError> {
    let raw = config::read_or_empty(path)?;
    Ok(Resources::from_config(&raw)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_str;
    use crate::origin::RunOrigin;
    use crate::resource::{item_str, HASH_KEY, RESERVED_KEY};
    use tempfile::TempDir;

    const CATALOG: &str = "
modem:
  - imsi: '901700000000001'
  - imsi: '901700000000002'
bts:
  - type: sysmo
";

    fn res(yaml: &str) -> Resources {
        Resources::from_config(&from_str(yaml).unwrap()).unwrap()
    }

    fn pool_in(dir: &Path, catalog: &str) -> Arc<ResourcePool> {
        let registry = SchemaRegistry::builtin().unwrap();
        Arc::new(ResourcePool::from_resources(
            res(catalog),
            StateDir::new(dir),
            registry.resources_schema().clone(),
        ))
    }

    fn origin(name: &str) -> Arc<dyn Origin> {
        Arc::new(RunOrigin::new(name))
    }

    #[test]
    fn end_to_end_reserve_and_exclusion() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let a = origin("a");

        let mut handle = pool
            .reserve(
                Arc::clone(&a),
                &res("modem: [{}, {}]\nbts: [{type: sysmo}]"),
                &Resources::new(),
            )
            .unwrap();
        assert_eq!(handle.count("modem"), 2);
        assert_eq!(handle.count("bts"), 1);

        let err = pool
            .reserve(origin("b"), &res("modem: [{}]"), &Resources::new())
            .unwrap_err();
        assert!(err.is_no_resource(), "{err}");

        handle.free().unwrap();
        assert!(pool.reserved_state().unwrap().is_empty());
    }

    #[test]
    fn exclusivity_across_pools_sharing_state() {
        let tmp = TempDir::new().unwrap();
        let catalog = "modem: [{imsi: '901700000000001'}]";
        let first = pool_in(tmp.path(), catalog);
        let second = pool_in(tmp.path(), catalog);
        let want = res("modem: [{}]");

        let mut held = first
            .reserve(origin("a"), &want, &Resources::new())
            .unwrap();
        let err = second
            .reserve(origin("b"), &want, &Resources::new())
            .unwrap_err();
        assert!(err.is_no_resource());

        held.free().unwrap();
        let mut again = second
            .reserve(origin("b"), &want, &Resources::new())
            .unwrap();
        again.free().unwrap();
    }

    #[test]
    fn concurrent_reservations_have_one_winner() {
        use std::sync::Barrier;
        use std::thread;

        let tmp = TempDir::new().unwrap();
        let catalog = "modem: [{imsi: '901700000000001'}]";
        let pools = [pool_in(tmp.path(), catalog), pool_in(tmp.path(), catalog)];
        let barrier = Arc::new(Barrier::new(pools.len()));

        let workers: Vec<_> = pools
            .iter()
            .enumerate()
            .map(|(i, pool)| {
                let pool = Arc::clone(pool);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    pool.reserve(
                        origin(&format!("suite{i}")),
                        &res("modem: [{}]"),
                        &Resources::new(),
                    )
                })
            })
            .collect();
        let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        let (won, lost): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
        assert_eq!(won.len(), 1);
        assert_eq!(lost.len(), 1);
        for result in lost {
            assert!(result.unwrap_err().is_no_resource());
        }
        assert_eq!(pools[0].reserved_state().unwrap().count("modem"), 1);

        for result in won {
            result.unwrap().free().unwrap();
        }
        assert!(pools[1].reserved_state().unwrap().is_empty());
    }

    #[test]
    fn usage_report_lists_asked_reserved_and_pool_counts() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let _held = pool
            .reserve(origin("a"), &res("modem: [{}]"), &Resources::new())
            .unwrap();

        let want = res("modem: [{}, {}]");
        let err = pool
            .reserve(origin("b"), &want, &Resources::new())
            .unwrap_err();
        assert!(err.is_no_resource());

        let state = pool.reserved_state().unwrap();
        let report = pool.usage_report(&want, &state);
        assert_eq!(
            report,
            vec![KindUsage {
                kind: "modem".into(),
                asked: 2,
                reserved: 1,
                pool: 2,
            }]
        );
        pool.shutdown();
    }

    #[test]
    fn persisted_record_carries_owner_and_hash() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let a = origin("a");
        let _handle = pool
            .reserve(Arc::clone(&a), &res("bts: [{}]"), &Resources::new())
            .unwrap();

        let state = pool.reserved_state().unwrap();
        let item = &state.get("bts").unwrap()[0];
        assert_eq!(item_str(item, RESERVED_KEY), Some(a.origin_id()));
        assert!(item_str(item, HASH_KEY).is_some());
        pool.shutdown();
    }

    #[test]
    fn failed_request_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let err = pool
            .reserve(origin("a"), &res("bts: [{}, {}]"), &Resources::new())
            .unwrap_err();
        assert!(matches!(err, ResourceError::NotSolvable { .. }));
        assert!(pool.reserved_state().unwrap().is_empty());
        assert!(pool.outstanding().is_empty());
    }

    #[test]
    fn invalid_want_is_a_schema_error() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let err = pool
            .reserve(origin("a"), &res("modem: [{imsi: x}]"), &Resources::new())
            .unwrap_err();
        assert!(matches!(err, ResourceError::Schema(_)));
    }

    #[test]
    fn shutdown_releases_unfreed_reservations() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let _handle = pool
            .reserve(origin("a"), &res("modem: [{}]"), &Resources::new())
            .unwrap();
        assert_eq!(pool.outstanding().len(), 1);

        pool.shutdown();
        assert!(pool.outstanding().is_empty());
        assert!(pool.reserved_state().unwrap().is_empty());
        // idempotent
        pool.shutdown();
    }

    #[test]
    fn release_origin_drops_only_its_items() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let a = origin("a");
        let _ha = pool
            .reserve(Arc::clone(&a), &res("modem: [{}]"), &Resources::new())
            .unwrap();
        let mut hb = pool
            .reserve(origin("b"), &res("bts: [{}]"), &Resources::new())
            .unwrap();

        let released = pool.release_origin(a.origin_id()).unwrap();
        assert_eq!(released.count("modem"), 1);
        let state = pool.reserved_state().unwrap();
        assert_eq!(state.count("modem"), 0);
        assert_eq!(state.count("bts"), 1);
        hb.free().unwrap();
        assert!(pool.outstanding().is_empty());
    }

    #[test]
    fn counters_persist_across_calls() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let o = RunOrigin::new("c");
        assert_eq!(pool.next_msisdn(&o).unwrap(), "1001");
        assert_eq!(pool.next_msisdn(&o).unwrap(), "1002");
        assert_eq!(pool.next_lac(&o).unwrap(), "2");

        std::fs::write(tmp.path().join("last_used_rac.state"), "255\n").unwrap();
        assert_eq!(pool.next_rac(&o).unwrap(), "1");
        assert_eq!(pool.next_cellid(&o).unwrap(), "2");
        assert_eq!(pool.next_bvci(&o).unwrap(), "3");
    }

    #[test]
    fn counter_rejects_directory_and_garbage() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_in(tmp.path(), CATALOG);
        let o = RunOrigin::new("c");

        std::fs::create_dir(tmp.path().join("last_used_lac.state")).unwrap();
        assert!(matches!(
            pool.next_lac(&o),
            Err(ResourceError::NotAFile { .. })
        ));

        std::fs::write(tmp.path().join("last_used_rac.state"), "300").unwrap();
        assert!(matches!(pool.next_rac(&o), Err(ResourceError::Schema(_))));
    }

    #[test]
    fn load_validates_catalog() {
        let tmp = TempDir::new().unwrap();
        let conf = tmp.path().join("resources.conf");
        std::fs::write(&conf, "modem:\n  - imsi: not-digits\n").unwrap();
        let registry = SchemaRegistry::builtin().unwrap();
        let err = ResourcePool::load(&conf, StateDir::new(tmp.path().join("state")), &registry)
            .unwrap_err();
        assert!(matches!(err, ResourceError::Config(_)));

        std::fs::write(&conf, CATALOG).unwrap();
        let pool =
            ResourcePool::load(&conf, StateDir::new(tmp.path().join("state")), &registry).unwrap();
        assert_eq!(pool.all_resources().count("modem"), 2);
    }
}
