/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Error types for configuration loading and merging.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::SchemaError;

// ── ValueKind ─────────────────────────────────────────────────────────────────

/// Shape of a [`ConfigValue`](super::ConfigValue) node, carried in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    Sequence,
    Mapping,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Scalar => write!(f, "scalar"),
            ValueKind::Sequence => write!(f, "list"),
            ValueKind::Mapping => write!(f, "dict"),
        }
    }
}

// ── ConfigError ───────────────────────────────────────────────────────────────

/// Failure while reading, writing or merging configuration.
///
/// Merge errors carry the dotted path (`bts[0].trx_list[1].addr`) of the node
/// where the two trees disagreed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// `overlay` / `combine` / `add` found a dict or list on one side and a
    /// different shape on the other.
    #[error("{path}: cannot combine {dest} with a value of type {src}")]
    KindMismatch {
        path: String,
        dest: ValueKind,
        src: ValueKind,
    },

    /// `combine` / `add` found two different scalar values for the same leaf.
    #[error("{path}: cannot combine dest={dest} with src={src}")]
    Conflict {
        path: String,
        dest: String,
        src: String,
    },

    /// A list mixes elements of different shapes, e.g. `[a, {b: c}]`.
    #[error("{path}: list elements are not all of the same type ({first} vs {second})")]
    MixedListTypes {
        path: String,
        first: ValueKind,
        second: ValueKind,
    },

    #[error("{path}: invalid times value {value}, expected an integer >= 1")]
    InvalidTimes { path: String, value: String },

    /// A section does not have the shape its consumer requires, e.g. a
    /// resource kind that is not a list of dicts.
    #[error("{path}: expected a {expected}, found a {found}")]
    UnexpectedShape {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}
