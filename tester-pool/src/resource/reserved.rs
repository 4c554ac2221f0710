/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! A suite's exclusive slice of the pool.
//!
//! Items are checked out to individual tests with [`ReservedResources::get`]
//! and returned with [`ReservedResources::put`].  Checkout state lives only in
//! this process: it is a [`USED_KEY`] marker on the local copy, never written
//! to the shared state.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{self, ConfigValue};
use crate::origin::Origin;

use super::{
    item_str, ResourceError, ResourceItem, ResourcePool, Resources, UnavailableReason, HASH_KEY,
    USED_KEY,
};

pub struct ReservedResources {
    pool: Arc<ResourcePool>,
    origin: Arc<dyn Origin>,
    /// Items as persisted, before modifiers; `None` once freed.
    reserved_original: Option<Resources>,
    /// Items with modifiers applied, carrying the checkout markers.
    reserved: Resources,
}

impl ReservedResources {
    /// Wrap a fresh reservation, overlaying `modifiers` onto a copy of it.
    pub(crate) fn new(
        pool: Arc<ResourcePool>,
        origin: Arc<dyn Origin>,
        reserved: Resources,
        modifiers: &Resources,
    ) -> Result<Self, ResourceError> {
        // Extra modifier items would be overlaid as items that were never
        // reserved.
        for (kind, items) in modifiers.iter() {
            if items.len() > reserved.count(kind) {
                return Err(ResourceError::UnreservedModifier {
                    kind: kind.to_string(),
                    modifiers: items.len(),
                    reserved: reserved.count(kind),
                });
            }
        }

        let mut overlaid = reserved.to_config();
        config::overlay(&mut overlaid, modifiers.to_config())?;
        let overlaid = Resources::from_config(&overlaid)?;
        Ok(Self {
            pool,
            origin,
            reserved_original: Some(reserved),
            reserved: overlaid,
        })
    }

    pub fn origin(&self) -> &dyn Origin {
        self.origin.as_ref()
    }

    /// The reserved items with modifiers applied.
    pub fn reserved(&self) -> &Resources {
        &self.reserved
    }

    pub fn count(&self, kind: &str) -> usize {
        self.reserved.count(kind)
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.reserved.counts()
    }

    /// Check out one unused reserved item of `kind` matching `specifics`.
    ///
    /// Returns a copy; mutating it does not affect the reservation.
    ///
    /// # Errors
    /// [`ResourceError::Unavailable`] with the reason nothing could be handed
    /// out.
    pub fn get(
        &mut self,
        kind: &str,
        specifics: &ResourceItem,
    ) -> Result<ResourceItem, ResourceError> {
        let mut want = Resources::new();
        want.insert(kind, vec![specifics.clone()]);

        let picks = self
            .reserved
            .find_indices(self.origin.as_ref(), &want, Some(USED_KEY), false)?;
        let picked = picks.get(kind).and_then(|indices| indices.first().copied());

        let Some(idx) = picked else {
            return Err(self.unavailable(kind, specifics, &want)?);
        };
        let items = self
            .reserved
            .get_mut(kind)
            .ok_or_else(|| ResourceError::NoSuchKind {
                kind: kind.to_string(),
            })?;
        let item = &mut items[idx];
        item.insert(USED_KEY.to_string(), ConfigValue::from("true"));
        debug!(origin = %self.origin.origin_id(), kind = kind, "checked out resource");
        Ok(item.clone())
    }

    /// Work out why `get()` found nothing.
    fn unavailable(
        &self,
        kind: &str,
        specifics: &ResourceItem,
        want: &Resources,
    ) -> Result<ResourceError, ResourceError> {
        let items = self.reserved.get(kind).unwrap_or(&[]);
        let reserved = items.len();
        let used = items.iter().filter(|i| i.contains_key(USED_KEY)).count();
        let any_match = self
            .reserved
            .find_indices(self.origin.as_ref(), want, None, false)?
            .get(kind)
            .is_some_and(|indices| !indices.is_empty());

        let shown = ConfigValue::Mapping(specifics.clone()).to_string();
        let reason = if !any_match && reserved > 0 {
            UnavailableReason::NoneMatch { specifics: shown }
        } else if used >= reserved {
            UnavailableReason::NotEnoughReserved { reserved }
        } else {
            UnavailableReason::AllInUse {
                reserved,
                used,
                specifics: shown,
            }
        };
        Ok(ResourceError::Unavailable {
            kind: kind.to_string(),
            instance: used + 1,
            reason,
        })
    }

    /// Check a previously checked-out item back in.
    ///
    /// # Errors
    /// [`ResourceError::NotInUse`] if `item` was not handed out by [`get`],
    /// [`ResourceError::MissingHash`] if it lost its hash marker.
    ///
    /// [`get`]: ReservedResources::get
    pub fn put(&mut self, item: &ResourceItem) -> Result<(), ResourceError> {
        if !item.contains_key(USED_KEY) {
            return Err(ResourceError::NotInUse {
                item: ConfigValue::Mapping(item.clone()).to_string(),
            });
        }
        let Some(hash) = item_str(item, HASH_KEY) else {
            return Err(ResourceError::MissingHash {
                item: ConfigValue::Mapping(item.clone()).to_string(),
            });
        };

        match self
            .reserved
            .items_mut()
            .find(|mine| item_str(mine, HASH_KEY) == Some(hash))
        {
            Some(mine) => {
                mine.remove(USED_KEY);
            }
            None => warn!(hash = hash, "put() of a resource not in this reservation"),
        }
        Ok(())
    }

    /// Check every item back in.
    pub fn put_all(&mut self) {
        for item in self.reserved.items_mut() {
            item.remove(USED_KEY);
        }
    }

    /// Return the reservation to the pool.  Calling it again does nothing.
    pub fn free(&mut self) -> Result<(), ResourceError> {
        if let Some(original) = &self.reserved_original {
            self.pool.free(self.origin.as_ref(), original)?;
            self.reserved_original = None;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReservedResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservedResources")
            .field("origin", &self.origin.origin_id())
            .field("freed", &self.reserved_original.is_none())
            .field("reserved", &self.reserved)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_str;
    use crate::origin::RunOrigin;
    use crate::schema::SchemaRegistry;
    use crate::state::StateDir;
    use tempfile::TempDir;

    const CATALOG: &str = "
modem:
  - imsi: '901700000000001'
    features: [sms, voice]
  - imsi: '901700000000002'
bts:
  - type: sysmo
    label: old
";

    fn res(yaml: &str) -> Resources {
        Resources::from_config(&from_str(yaml).unwrap()).unwrap()
    }

    fn wanted(yaml: &str) -> ResourceItem {
        from_str(yaml).unwrap().as_mapping().unwrap().clone()
    }

    fn reserve(tmp: &TempDir, want: &str, modifiers: &str) -> ReservedResources {
        let registry = SchemaRegistry::builtin().unwrap();
        let pool = Arc::new(ResourcePool::from_resources(
            res(CATALOG),
            StateDir::new(tmp.path()),
            registry.resources_schema().clone(),
        ));
        pool.reserve(Arc::new(RunOrigin::new("suite")), &res(want), &res(modifiers))
            .unwrap()
    }

    fn used_markers(r: &ReservedResources) -> Vec<bool> {
        r.reserved()
            .iter()
            .flat_map(|(_, items)| items.iter().map(|i| i.contains_key(USED_KEY)))
            .collect()
    }

    #[test]
    fn get_then_put_restores_state() {
        let tmp = TempDir::new().unwrap();
        let mut r = reserve(&tmp, "modem: [{}, {}]", "{}");
        let before = used_markers(&r);

        let item = r.get("modem", &wanted("{features: [sms]}")).unwrap();
        assert_eq!(item_str(&item, "imsi"), Some("901700000000001"));
        assert_ne!(used_markers(&r), before);

        r.put(&item).unwrap();
        assert_eq!(used_markers(&r), before);
        assert!(r.get("modem", &wanted("{features: [sms]}")).is_ok());
        r.free().unwrap();
    }

    #[test]
    fn get_returns_independent_copy() {
        let tmp = TempDir::new().unwrap();
        let mut r = reserve(&tmp, "bts: [{}]", "{}");
        let mut item = r.get("bts", &ResourceItem::new()).unwrap();
        item.insert("type".into(), ConfigValue::from("changed"));
        assert_eq!(item_str(&r.reserved().get("bts").unwrap()[0], "type"), Some("sysmo"));
        r.free().unwrap();
    }

    #[test]
    fn modifiers_apply_to_reservation_only() {
        let tmp = TempDir::new().unwrap();
        let mut r = reserve(&tmp, "bts: [{}]", "bts: [{label: new}]");
        let item = r.get("bts", &wanted("{label: new}")).unwrap();
        assert_eq!(item_str(&item, "type"), Some("sysmo"));
        r.put(&item).unwrap();

        // the persisted record keeps the catalog value
        let state = r.pool.reserved_state().unwrap();
        assert_eq!(item_str(&state.get("bts").unwrap()[0], "label"), Some("old"));
        r.free().unwrap();
    }

    #[test]
    fn modifiers_beyond_reservation_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let registry = SchemaRegistry::builtin().unwrap();
        let pool = Arc::new(ResourcePool::from_resources(
            res("bts: [{type: a}]"),
            StateDir::new(tmp.path()),
            registry.resources_schema().clone(),
        ));

        let err = pool
            .reserve(
                Arc::new(RunOrigin::new("suite")),
                &res("bts: [{}]"),
                &res("bts: [{}, {label: ghost}]"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::UnreservedModifier {
                modifiers: 2,
                reserved: 1,
                ..
            }
        ));

        let err = pool
            .reserve(
                Arc::new(RunOrigin::new("suite")),
                &res("bts: [{}]"),
                &res("modem: [{label: ghost}]"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::UnreservedModifier { reserved: 0, .. }
        ));

        // nothing was persisted, the bts is still available
        assert!(pool.reserved_state().unwrap().is_empty());
        assert!(pool.outstanding().is_empty());
        let mut r = pool
            .reserve(
                Arc::new(RunOrigin::new("suite")),
                &res("bts: [{}]"),
                &res("bts: [{label: dut}]"),
            )
            .unwrap();
        assert_eq!(r.count("bts"), 1);
        let item = r.get("bts", &ResourceItem::new()).unwrap();
        assert!(item_str(&item, HASH_KEY).is_some());
        r.put(&item).unwrap();
        r.free().unwrap();
    }

    #[test]
    fn unavailable_reasons_are_distinguished() {
        let tmp = TempDir::new().unwrap();
        let mut r = reserve(&tmp, "modem: [{}, {}]", "{}");

        let err = r.get("modem", &wanted("{imsi: '901700000000009'}")).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Unavailable {
                reason: UnavailableReason::NoneMatch { .. },
                ..
            }
        ));
        assert!(err.to_string().contains("none of the reserved resources matches"));

        r.get("modem", &wanted("{features: [voice]}")).unwrap();
        let err = r.get("modem", &wanted("{features: [voice]}")).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Unavailable {
                instance: 2,
                reason: UnavailableReason::AllInUse { reserved: 2, used: 1, .. },
                ..
            }
        ));

        r.get("modem", &ResourceItem::new()).unwrap();
        let err = r.get("modem", &ResourceItem::new()).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Unavailable {
                reason: UnavailableReason::NotEnoughReserved { reserved: 2 },
                ..
            }
        ));
        assert!(err.is_no_resource());

        let err = r.get("bts", &ResourceItem::new()).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Unavailable {
                reason: UnavailableReason::NotEnoughReserved { reserved: 0 },
                ..
            }
        ));
        r.free().unwrap();
    }

    #[test]
    fn put_requires_checked_out_item() {
        let tmp = TempDir::new().unwrap();
        let mut r = reserve(&tmp, "modem: [{}]", "{}");
        let item = r.reserved().get("modem").unwrap()[0].clone();
        assert!(matches!(r.put(&item), Err(ResourceError::NotInUse { .. })));

        let mut item = r.get("modem", &ResourceItem::new()).unwrap();
        item.remove(HASH_KEY);
        assert!(matches!(r.put(&item), Err(ResourceError::MissingHash { .. })));
        r.free().unwrap();
    }

    #[test]
    fn put_all_clears_every_checkout() {
        let tmp = TempDir::new().unwrap();
        let mut r = reserve(&tmp, "modem: [{}, {}]\nbts: [{}]", "{}");
        r.get("modem", &ResourceItem::new()).unwrap();
        r.get("bts", &ResourceItem::new()).unwrap();
        r.put_all();
        assert!(used_markers(&r).iter().all(|used| !used));
        assert_eq!(r.counts()["modem"], 2);
        r.free().unwrap();
    }

    #[test]
    fn double_free_is_a_noop() {
        let tmp = TempDir::new().unwrap();
        let mut r = reserve(&tmp, "modem: [{}]", "{}");
        r.free().unwrap();
        r.free().unwrap();
        assert!(r.pool.reserved_state().unwrap().is_empty());
    }
}
