/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Flat dot-path schemas for configuration trees.
//!
//! A [`Schema`] maps leaf paths to [`TypeTag`]s:
//!
//! ```text
//! bts[].addr                  → ipv4
//! bts[].trx_list[].hw_addr    → hwaddr
//! modem[].features[]          → modem_feature
//! ```
//!
//! List elements are addressed with a `[]` suffix, so every element of one
//! list is checked against the same entries.  Intermediate dicts need no
//! entry of their own: the validator descends into them implicitly and only
//! complains when it reaches a leaf whose path is unknown.
//!
//! Validation stops at the first violation.

pub mod registry;
pub mod types;

pub use registry::{ResourceKind, SchemaRegistry};
pub use types::TypeTag;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::config::{child_path, ConfigMap, ConfigValue};

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("config key regex"));

// ── SchemaError ───────────────────────────────────────────────────────────────

/// A configuration tree does not conform to its schema, or two schema
/// fragments disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("config item not known: {path:?}")]
    UnknownKey { path: String },

    #[error("invalid config key {key:?} below {parent:?}")]
    InvalidKey { parent: String, key: String },

    #[error("config item is a dict but should be a leaf node of type {expected}: {path:?}")]
    ExpectedLeaf { path: String, expected: TypeTag },

    #[error("config item is a list, should be {expected}: {path:?}")]
    UnexpectedList { path: String, expected: TypeTag },

    #[error("invalid {tag} at {path:?}: {value:?} ({reason})")]
    InvalidValue {
        path: String,
        tag: TypeTag,
        value: String,
        reason: String,
    },

    #[error("configuration root must be a dict")]
    RootNotMapping,

    /// Two schema fragments declare different types for the same path.
    #[error("schema conflict at {path:?}: {existing} vs {new}")]
    Conflict {
        path: String,
        existing: TypeTag,
        new: TypeTag,
    },
}

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    entries: BTreeMap<String, TypeTag>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from `(path, tag)` pairs, failing on duplicate paths with
    /// different tags.
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = (&'a str, TypeTag)>,
    ) -> Result<Self, SchemaError> {
        let mut schema = Self::new();
        for (path, tag) in entries {
            schema.insert(path, tag)?;
        }
        Ok(schema)
    }

    /// Add one entry.  Re-inserting an identical entry is a no-op.
    pub fn insert(&mut self, path: &str, tag: TypeTag) -> Result<(), SchemaError> {
        match self.entries.get(path) {
            Some(&existing) if existing != tag => Err(SchemaError::Conflict {
                path: path.to_string(),
                existing,
                new: tag,
            }),
            Some(_) => Ok(()),
            None => {
                self.entries.insert(path.to_string(), tag);
                Ok(())
            }
        }
    }

    /// Merge `other` into `self`.  A path present in both with a different tag
    /// is a [`SchemaError::Conflict`]; `self` is left untouched in that case.
    pub fn combine(&mut self, other: &Schema) -> Result<(), SchemaError> {
        for (path, &new) in &other.entries {
            if let Some(&existing) = self.entries.get(path) {
                if existing != new {
                    return Err(SchemaError::Conflict {
                        path: path.clone(),
                        existing,
                        new,
                    });
                }
            }
        }
        self.entries
            .extend(other.entries.iter().map(|(p, &t)| (p.clone(), t)));
        Ok(())
    }

    /// Copy of this schema with every path prefixed by `prefix.`.
    pub fn prefixed(&self, prefix: &str) -> Schema {
        Schema {
            entries: self
                .entries
                .iter()
                .map(|(p, &t)| (child_path(prefix, p), t))
                .collect(),
        }
    }

    pub fn get(&self, path: &str) -> Option<TypeTag> {
        self.entries.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeTag)> {
        self.entries.iter().map(|(p, &t)| (p.as_str(), t))
    }

    // ── Validation ────────────────────────────────────────────────────────────

    /// Check every leaf of `config` against this schema.
    ///
    /// # Errors
    /// The first [`SchemaError`] encountered in key order.
    pub fn validate(&self, config: &ConfigValue) -> Result<(), SchemaError> {
        match config {
            ConfigValue::Mapping(map) => self.nest("", map),
            _ => Err(SchemaError::RootNotMapping),
        }
    }

    fn nest(&self, parent: &str, map: &ConfigMap) -> Result<(), SchemaError> {
        for (key, value) in map {
            if !KEY_RE.is_match(key) {
                return Err(SchemaError::InvalidKey {
                    parent: parent.to_string(),
                    key: key.clone(),
                });
            }
            self.validate_item(&child_path(parent, key), value)?;
        }
        Ok(())
    }

    fn validate_item(&self, path: &str, value: &ConfigValue) -> Result<(), SchemaError> {
        let list_path;
        let (path, want) = match value {
            ConfigValue::Sequence(_) => {
                if let Some(expected) = self.get(path) {
                    return Err(SchemaError::UnexpectedList {
                        path: path.to_string(),
                        expected,
                    });
                }
                list_path = format!("{}[]", path);
                (list_path.as_str(), self.get(&list_path))
            }
            _ => (path, self.get(path)),
        };

        match (want, value) {
            (_, ConfigValue::Sequence(items)) => items
                .iter()
                .try_for_each(|item| self.validate_item(path, item)),
            (None, ConfigValue::Mapping(map)) => self.nest(path, map),
            (None, ConfigValue::Scalar(_)) => Err(SchemaError::UnknownKey {
                path: path.to_string(),
            }),
            (Some(expected), ConfigValue::Mapping(_)) => Err(SchemaError::ExpectedLeaf {
                path: path.to_string(),
                expected,
            }),
            (Some(tag), ConfigValue::Scalar(s)) => {
                tag.check(s).map_err(|reason| SchemaError::InvalidValue {
                    path: path.to_string(),
                    tag,
                    value: s.clone(),
                    reason,
                })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
