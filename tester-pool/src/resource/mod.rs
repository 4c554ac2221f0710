/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Resource catalog, matching and allocation.
//!
//! [`Resources`] is a typed collection of resource items keyed by kind:
//!
//! ```yaml
//! modem:
//!   - {imsi: '901700000000001', ki: ..., features: [sms]}
//!   - {imsi: '901700000000002', ki: ...}
//! bts:
//!   - {type: osmo-bts-sysmo, addr: 10.42.42.114}
//! ```
//!
//! The same type carries three different contents:
//!
//! * the full catalog read from `resources.conf`,
//! * a *want*: per-kind lists of constraint dicts, possibly empty,
//! * a reservation: the concrete items picked for one origin.
//!
//! # Item identity
//! Every catalog item gets a content hash ([`HASH_KEY`]) computed over its
//! user fields only.  Items keep that hash through serialisation into the
//! reservation file, so "the same item" across processes means "same hash",
//! never object identity.
//!
//! # Pipeline
//! ```text
//! catalog ──without(reserved)──► candidates ──find(want)──► picked
//!                                                 │
//!                                 per-slot candidate lists ──solve()──► indices
//! ```

pub mod counter;
pub mod error;
pub mod pool;
pub mod reserved;
pub mod solver;

pub use counter::Counter;
pub use error::{ResourceError, UnavailableReason};
pub use pool::ResourcePool;
pub use reserved::ReservedResources;
pub use solver::{solve, NotSolvable};

use std::collections::{BTreeMap, HashSet};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{
    common_elem_kind, index_path, ConfigError, ConfigMap, ConfigValue, ValueKind,
};
use crate::origin::Origin;

// ── Marker keys ───────────────────────────────────────────────────────────────

/// Content hash of an item, its identity across processes.
pub const HASH_KEY: &str = "_hash";
/// Origin id of the reservation owning an item.
pub const RESERVED_KEY: &str = "_reserved_by";
/// Present while an item is checked out inside a suite.
pub const USED_KEY: &str = "_used";

const MARKER_KEYS: [&str; 3] = [HASH_KEY, RESERVED_KEY, USED_KEY];

/// One concrete resource instance (or one constraint, in a want).
pub type ResourceItem = ConfigMap;

/// Per-kind catalog indices chosen by [`Resources::find_indices`].
pub type Picks = BTreeMap<String, Vec<usize>>;

// ── Hashing ───────────────────────────────────────────────────────────────────

/// Content hash of `item`, ignoring marker keys at every level.
///
/// Stable across `tostr()` / `read()` round trips because the standardised
/// tree has sorted keys and string leaves only.
pub fn hash_item(item: &ResourceItem) -> String {
    let mut hasher = Sha256::new();
    feed_map(&mut hasher, item);
    format!("{:x}", hasher.finalize())
}

fn feed_map(hasher: &mut Sha256, map: &ConfigMap) {
    let fields: Vec<_> = map
        .iter()
        .filter(|(k, _)| !MARKER_KEYS.contains(&k.as_str()))
        .collect();
    hasher.update(b"{");
    hasher.update((fields.len() as u64).to_le_bytes());
    for (key, value) in fields {
        feed_str(hasher, key);
        feed_value(hasher, value);
    }
}

fn feed_value(hasher: &mut Sha256, value: &ConfigValue) {
    match value {
        ConfigValue::Scalar(s) => {
            hasher.update(b"s");
            feed_str(hasher, s);
        }
        ConfigValue::Sequence(items) => {
            hasher.update(b"[");
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                feed_value(hasher, item);
            }
        }
        ConfigValue::Mapping(map) => feed_map(hasher, map),
    }
}

fn feed_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

// ── Matching ──────────────────────────────────────────────────────────────────

/// Does `item` satisfy the constraint `wanted`?
///
/// * dicts: every key of `wanted` must match the same key of `item`;
///   an empty dict matches any dict,
/// * lists of scalars: set containment (order irrelevant),
/// * lists of dicts or lists: position by position, the shorter side padded
///   with empty elements,
/// * scalars: string equality.
///
/// A missing key in `item` never matches.
///
/// # Errors
/// [`ConfigError::MixedListTypes`] if a list (on either side) mixes element
/// shapes.
pub fn item_matches(item: Option<&ConfigValue>, wanted: &ConfigValue) -> Result<bool, ConfigError> {
    item_matches_at(item, wanted, "")
}

fn item_matches_at(
    item: Option<&ConfigValue>,
    wanted: &ConfigValue,
    path: &str,
) -> Result<bool, ConfigError> {
    match wanted {
        ConfigValue::Mapping(wanted_map) => {
            let Some(ConfigValue::Mapping(item_map)) = item else {
                return Ok(false);
            };
            map_matches_at(item_map, wanted_map, path)
        }
        ConfigValue::Sequence(wanted_list) => {
            let Some(ConfigValue::Sequence(item_list)) = item else {
                return Ok(false);
            };
            match common_elem_kind(wanted_list.iter().chain(item_list.iter()), path)? {
                None => Ok(true),
                Some(ValueKind::Scalar) => Ok(wanted_list.iter().all(|w| item_list.contains(w))),
                Some(kind) => {
                    let empty = ConfigValue::empty(kind);
                    let len = wanted_list.len().max(item_list.len());
                    for idx in 0..len {
                        let sub_item = item_list.get(idx).unwrap_or(&empty);
                        let sub_wanted = wanted_list.get(idx).unwrap_or(&empty);
                        if !item_matches_at(Some(sub_item), sub_wanted, &index_path(path, idx))? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
            }
        }
        ConfigValue::Scalar(w) => Ok(matches!(item, Some(ConfigValue::Scalar(s)) if s == w)),
    }
}

fn map_matches_at(item: &ConfigMap, wanted: &ConfigMap, path: &str) -> Result<bool, ConfigError> {
    for (key, wanted_val) in wanted {
        let key_path = crate::config::child_path(path, key);
        if !item_matches_at(item.get(key), wanted_val, &key_path)? {
            return Ok(false);
        }
    }
    Ok(true)
}

// ── Resources ─────────────────────────────────────────────────────────────────

/// Kind → ordered list of items.  List order is catalog order and decides
/// preference when several items match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    kinds: BTreeMap<String, Vec<ResourceItem>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a standardised tree shaped `{kind: [{...}, ...], ...}`.
    ///
    /// # Errors
    /// [`ConfigError::UnexpectedShape`] if the root is not a dict, a kind is
    /// not a list, or a list element is not a dict.
    pub fn from_config(config: &ConfigValue) -> Result<Self, ConfigError> {
        let ConfigValue::Mapping(map) = config else {
            return Err(ConfigError::UnexpectedShape {
                path: String::new(),
                expected: ValueKind::Mapping,
                found: config.kind(),
            });
        };

        let mut kinds = BTreeMap::new();
        for (kind, value) in map {
            let ConfigValue::Sequence(items) = value else {
                return Err(ConfigError::UnexpectedShape {
                    path: kind.clone(),
                    expected: ValueKind::Sequence,
                    found: value.kind(),
                });
            };
            let mut list = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                let ConfigValue::Mapping(fields) = item else {
                    return Err(ConfigError::UnexpectedShape {
                        path: index_path(kind, idx),
                        expected: ValueKind::Mapping,
                        found: item.kind(),
                    });
                };
                list.push(fields.clone());
            }
            kinds.insert(kind.clone(), list);
        }
        Ok(Self { kinds })
    }

    pub fn to_config(&self) -> ConfigValue {
        ConfigValue::Mapping(
            self.kinds
                .iter()
                .map(|(kind, items)| {
                    let list = items.iter().cloned().map(ConfigValue::Mapping).collect();
                    (kind.clone(), ConfigValue::Sequence(list))
                })
                .collect(),
        )
    }

    /// Replace the list for `kind`.
    pub fn insert(&mut self, kind: impl Into<String>, items: Vec<ResourceItem>) {
        self.kinds.insert(kind.into(), items);
    }

    pub fn get(&self, kind: &str) -> Option<&[ResourceItem]> {
        self.kinds.get(kind).map(Vec::as_slice)
    }

    pub(crate) fn get_mut(&mut self, kind: &str) -> Option<&mut Vec<ResourceItem>> {
        self.kinds.get_mut(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ResourceItem])> {
        self.kinds.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = &mut ResourceItem> {
        self.kinds.values_mut().flatten()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// `true` when no kind holds any item.
    pub fn is_empty(&self) -> bool {
        self.kinds.values().all(Vec::is_empty)
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds.get(kind).map_or(0, Vec::len)
    }

    /// Item count per kind.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.kinds
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect()
    }

    // ── Markers ───────────────────────────────────────────────────────────────

    /// Stamp every item with its content hash.
    pub fn set_hashes(&mut self) {
        for item in self.items_mut() {
            let hash = hash_item(item);
            item.insert(HASH_KEY.to_string(), ConfigValue::Scalar(hash));
        }
    }

    /// Stamp every item as reserved by `origin_id`.
    pub fn mark_reserved_by(&mut self, origin_id: &str) {
        for item in self.items_mut() {
            item.insert(
                RESERVED_KEY.to_string(),
                ConfigValue::Scalar(origin_id.to_string()),
            );
        }
    }

    /// Subset of items whose [`RESERVED_KEY`] is `origin_id`.
    pub fn reserved_by(&self, origin_id: &str) -> Resources {
        let mut out = Resources::new();
        for (kind, items) in &self.kinds {
            let owned: Vec<_> = items
                .iter()
                .filter(|item| item_str(item, RESERVED_KEY) == Some(origin_id))
                .cloned()
                .collect();
            if !owned.is_empty() {
                out.insert(kind.clone(), owned);
            }
        }
        out
    }

    // ── Set operations ────────────────────────────────────────────────────────

    /// Append every item of `more`, per kind.
    ///
    /// This is the form of [`crate::config::add`] used for the reservation
    /// record: lists are concatenated per kind as there, but items are told
    /// apart by `_hash` instead of by field-wise scalar agreement.
    ///
    /// # Errors
    /// [`ResourceError::DoubleBooked`] if an item of `more` has the same hash
    /// as an item already present; `self` is unchanged in that case.
    pub fn add(&mut self, more: &Resources) -> Result<(), ResourceError> {
        for (kind, items) in &more.kinds {
            let mine = self.kinds.get(kind).map(Vec::as_slice).unwrap_or(&[]);
            let hashes: HashSet<&str> = mine.iter().filter_map(|i| item_str(i, HASH_KEY)).collect();
            for item in items {
                if let Some(hash) = item_str(item, HASH_KEY) {
                    if hashes.contains(hash) {
                        let owner = mine
                            .iter()
                            .find(|i| item_str(i, HASH_KEY) == Some(hash))
                            .and_then(|i| item_str(i, RESERVED_KEY))
                            .unwrap_or("<unknown>");
                        return Err(ResourceError::DoubleBooked {
                            kind: kind.clone(),
                            owner: owner.to_string(),
                            item: ConfigValue::Mapping(item.clone()).to_string(),
                        });
                    }
                }
            }
        }
        for (kind, items) in &more.kinds {
            self.kinds
                .entry(kind.clone())
                .or_default()
                .extend(items.iter().cloned());
        }
        Ok(())
    }

    /// Remove every item of `other`, matched by hash.  Kinds left empty are
    /// removed entirely.
    ///
    /// # Errors
    /// [`ResourceError::NotFound`] when `fail_if_not_found` is set and an item
    /// of `other` is not present.
    pub fn drop(&mut self, other: &Resources, fail_if_not_found: bool) -> Result<(), ResourceError> {
        for (kind, items) in &other.kinds {
            for item in items {
                let hash = item_str(item, HASH_KEY);
                let position = match (self.kinds.get(kind), hash) {
                    (Some(mine), Some(hash)) => {
                        mine.iter().position(|m| item_str(m, HASH_KEY) == Some(hash))
                    }
                    _ => None,
                };
                match position {
                    Some(pos) => {
                        if let Some(mine) = self.kinds.get_mut(kind) {
                            mine.remove(pos);
                        }
                    }
                    None if fail_if_not_found => {
                        return Err(ResourceError::NotFound {
                            kind: kind.clone(),
                            item: ConfigValue::Mapping(item.clone()).to_string(),
                        });
                    }
                    None => {}
                }
            }
            if self.kinds.get(kind).is_some_and(Vec::is_empty) {
                self.kinds.remove(kind);
            }
        }
        Ok(())
    }

    /// Copy of `self` without any item whose hash appears in `reserved`.
    pub fn without(&self, reserved: &Resources) -> Resources {
        let mut fresh = self.clone();
        // Missing items are skipped, never reported.
        let _ = fresh.drop(reserved, false);
        fresh
    }

    // ── Allocation ────────────────────────────────────────────────────────────

    /// Pick one distinct item per constraint of `want` and return copies.
    ///
    /// # Errors
    /// The "no resource" family of [`ResourceError`] when the request cannot
    /// be satisfied.
    pub fn find(&self, origin: &dyn Origin, want: &Resources) -> Result<Resources, ResourceError> {
        let picks = self.find_indices(origin, want, None, true)?;
        Ok(self.picked(&picks))
    }

    /// Resolve `want` to catalog indices, kind by kind.
    ///
    /// Items carrying the `skip_if_marked` key are not candidates.  With
    /// `raise_if_missing == false`, a kind whose constraints cannot all find a
    /// candidate maps to an empty list instead of failing.
    pub fn find_indices(
        &self,
        origin: &dyn Origin,
        want: &Resources,
        skip_if_marked: Option<&str>,
        raise_if_missing: bool,
    ) -> Result<Picks, ResourceError> {
        let mut picks = Picks::new();

        for (kind, want_list) in &want.kinds {
            if want_list.is_empty() {
                picks.insert(kind.clone(), Vec::new());
                continue;
            }

            let my_list = match self.kinds.get(kind) {
                Some(list) if !list.is_empty() => list,
                _ if raise_if_missing => {
                    return Err(ResourceError::NoSuchKind { kind: kind.clone() });
                }
                _ => {
                    picks.insert(kind.clone(), Vec::new());
                    continue;
                }
            };

            let mut all_matches: Vec<Vec<usize>> = Vec::with_capacity(want_list.len());
            for want_item in want_list {
                let mut candidates = Vec::new();
                for (idx, my_item) in my_list.iter().enumerate() {
                    if skip_if_marked.is_some_and(|marker| my_item.contains_key(marker)) {
                        continue;
                    }
                    if map_matches_at(my_item, want_item, &index_path(kind, idx))? {
                        candidates.push(idx);
                    }
                }
                if candidates.is_empty() {
                    if raise_if_missing {
                        return Err(ResourceError::NoMatch {
                            kind: kind.clone(),
                            want: ConfigValue::Mapping(want_item.clone()).to_string(),
                        });
                    }
                    all_matches.clear();
                    break;
                }
                all_matches.push(candidates);
            }

            if all_matches.is_empty() {
                picks.insert(kind.clone(), Vec::new());
                continue;
            }

            let solution = solve(&all_matches).map_err(|NotSolvable| ResourceError::NotSolvable {
                kind: kind.clone(),
                count: want_list.len(),
                want: want_list_display(want_list),
            })?;

            debug!(
                origin = %origin.origin_id(),
                kind = %kind,
                picked = ?solution,
                "resolved resource request"
            );
            picks.insert(kind.clone(), solution);
        }

        Ok(picks)
    }

    /// Copies of the items at `picks`, per kind.
    pub fn picked(&self, picks: &Picks) -> Resources {
        let mut out = Resources::new();
        for (kind, indices) in picks {
            let list = self.kinds.get(kind).map(Vec::as_slice).unwrap_or(&[]);
            let items = indices
                .iter()
                .filter_map(|&i| list.get(i).cloned())
                .collect();
            out.insert(kind.clone(), items);
        }
        out
    }
}

/// String value of `key` in `item`, if present and scalar.
pub(crate) fn item_str<'a>(item: &'a ResourceItem, key: &str) -> Option<&'a str> {
    item.get(key).and_then(ConfigValue::as_str)
}

fn want_list_display(list: &[ResourceItem]) -> String {
    ConfigValue::Sequence(list.iter().cloned().map(ConfigValue::Mapping).collect()).to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
