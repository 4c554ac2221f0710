/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! tester-pool – resource reservation engine for a cellular test lab
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/     – YAML configuration store, merging, main config
//! ├── schema/     – flat dot-path schemas and the resource kind registry
//! ├── resource/   – catalog, matching, solver, pool, reservations, counters
//! ├── state.rs    – shared state directory and its file lock
//! ├── origin.rs   – identity of a reserving run
//! ├── suite.rs    – suite/scenario resource requests
//! └── context.rs  – process-wide init/shutdown
//! ```

pub mod config;
pub mod context;
pub mod origin;
pub mod resource;
pub mod schema;
pub mod state;
pub mod suite;
