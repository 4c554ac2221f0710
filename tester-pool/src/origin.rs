/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Identity of whoever reserves resources.
//!
//! Reservations, lock ownership and log lines are keyed by an *origin id*: a
//! string unique across every process sharing the state directory.

use uuid::Uuid;

/// Something that can own a reservation.
pub trait Origin: Send + Sync {
    /// Human-readable name, e.g. the suite name.
    fn name(&self) -> &str;

    /// Globally unique id used as the reservation owner and lock owner.
    fn origin_id(&self) -> &str;
}

/// Concrete origin for a test-suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOrigin {
    name: String,
    id: String,
}

impl RunOrigin {
    /// New origin with a fresh random id of the form `<name>-<uuid>`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = format!("{}-{}", name, Uuid::new_v4().simple());
        Self { name, id }
    }

    /// Origin with a caller-chosen id, e.g. to act on behalf of a dead
    /// process whose id is known from the reservation file.
    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

impl Origin for RunOrigin {
    fn name(&self) -> &str {
        &self.name
    }

    fn origin_id(&self) -> &str {
        &self.id
    }
}
