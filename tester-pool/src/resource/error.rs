/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for reservation and allocation.
//!
//! Two types model the two failure layers:
//!
//! * [`UnavailableReason`]: why an in-suite checkout (`get()`) found nothing
//!   to hand out.
//! * [`ResourceError`]: every failure surfaced by the catalog, the pool and
//!   reservation handles.
//!
//! The "no resource" family ([`ResourceError::is_no_resource`]) is the
//! user-facing outcome of an unsatisfiable request; everything else is a
//! configuration, protocol or filesystem problem.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::schema::SchemaError;

// ── Checkout failures ─────────────────────────────────────────────────────────

/// Detailed reason why `ReservedResources::get()` could not hand out an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Items of the kind are reserved, but none matches the specifics.
    NoneMatch { specifics: String },

    /// The suite reserved fewer items of this kind than it is trying to use.
    NotEnoughReserved { reserved: usize },

    /// Matching items exist but every one of them is checked out.
    AllInUse {
        reserved: usize,
        used: usize,
        specifics: String,
    },
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::NoneMatch { specifics } => write!(
                f,
                "none of the reserved resources matches requirements {}",
                specifics
            ),

            UnavailableReason::NotEnoughReserved { reserved } => {
                write!(f, "suite reserved only {} of this kind", reserved)
            }

            UnavailableReason::AllInUse {
                reserved,
                used,
                specifics,
            } => write!(
                f,
                "no unused resource left that matches the requirements; \
                 of {} reserved, {} are in use; of those not in use, none matches {}",
                reserved, used, specifics
            ),
        }
    }
}

// ── ResourceError ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ResourceError {
    /// The catalog has no items of the requested kind at all.
    #[error("no such kind of resource available: '{kind}'")]
    NoSuchKind { kind: String },

    /// Not a single catalog item satisfies one of the constraints.
    #[error("no matching resource available for {kind} = {want}")]
    NoMatch { kind: String, want: String },

    /// Every constraint has candidates, but not enough distinct ones.
    #[error(
        "could not resolve request to reserve resources: {count} x {kind} with requirements: {want}"
    )]
    NotSolvable {
        kind: String,
        count: usize,
        want: String,
    },

    /// In-suite checkout failed; `instance` is the 1-based number of the item
    /// that was being requested.
    #[error("when trying to use instance nr {instance} of '{kind}': {reason}")]
    Unavailable {
        kind: String,
        instance: usize,
        reason: UnavailableReason,
    },

    #[error("can only put() a resource that is in use: {item}")]
    NotInUse { item: String },

    #[error("can only put() a resource that has a hash marker: {item}")]
    MissingHash { item: String },

    /// `drop()` was asked to remove an item the collection does not hold.
    #[error("asked to drop a '{kind}' resource that is not in the pool: {item}")]
    NotFound { kind: String, item: String },

    /// Merging a reservation would list the same item twice.
    #[error("'{kind}' resource is already reserved by {owner}: {item}")]
    DoubleBooked {
        kind: String,
        owner: String,
        item: String,
    },

    /// Modifiers address more items of a kind than the reservation holds.
    #[error("modifiers for '{kind}' address {modifiers} item(s) but only {reserved} reserved")]
    UnreservedModifier {
        kind: String,
        modifiers: usize,
        reserved: usize,
    },

    #[error("path should be a file but is not: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ResourceError {
    /// `true` for the "request cannot be satisfied" family of errors.
    pub fn is_no_resource(&self) -> bool {
        matches!(
            self,
            ResourceError::NoSuchKind { .. }
                | ResourceError::NoMatch { .. }
                | ResourceError::NotSolvable { .. }
                | ResourceError::Unavailable { .. }
        )
    }
}
