/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Merging of configuration trees.
//!
//! Three flavours with different conflict policies:
//!
//! | Function | dicts | lists | scalars |
//! |---|---|---|---|
//! | [`overlay`] | recurse per key | element-wise up to `min(len)`, then append | `src` wins |
//! | [`combine`] | recurse per key | scalars: set union; composites: positional, padded | must be equal |
//! | [`add`] | recurse per key | concatenate | must be equal |
//!
//! All three fail with [`ConfigError::KindMismatch`] when `dest` is a dict or
//! a list and `src` is not of the same shape.

use super::{child_path, common_elem_kind, index_path, ConfigError, ConfigValue, ValueKind};

// ── overlay ───────────────────────────────────────────────────────────────────

/// Destructive deep merge of `src` onto `dest` where `src` always wins.
///
/// Used to layer suite `modifiers` onto the concrete reserved resources.
pub fn overlay(dest: &mut ConfigValue, src: ConfigValue) -> Result<(), ConfigError> {
    overlay_at(dest, src, "")
}

fn overlay_at(dest: &mut ConfigValue, src: ConfigValue, path: &str) -> Result<(), ConfigError> {
    match (dest, src) {
        (ConfigValue::Mapping(d), ConfigValue::Mapping(s)) => {
            for (key, val) in s {
                let key_path = child_path(path, &key);
                match d.get_mut(&key) {
                    Some(existing) => overlay_at(existing, val, &key_path)?,
                    None => {
                        d.insert(key, val);
                    }
                }
            }
            Ok(())
        }
        (ConfigValue::Sequence(d), ConfigValue::Sequence(s)) => {
            let copy_len = d.len().min(s.len());
            for (idx, val) in s.into_iter().enumerate() {
                if idx < copy_len {
                    overlay_at(&mut d[idx], val, &index_path(path, idx))?;
                } else {
                    d.push(val);
                }
            }
            Ok(())
        }
        (d @ ConfigValue::Mapping(_), s) | (d @ ConfigValue::Sequence(_), s) => {
            Err(ConfigError::KindMismatch {
                path: path.to_string(),
                dest: d.kind(),
                src: s.kind(),
            })
        }
        (d, s) => {
            *d = s;
            Ok(())
        }
    }
}

// ── combine ───────────────────────────────────────────────────────────────────

/// Conflict-checked deep merge, used to fold scenario files onto a suite
/// definition.
///
/// Lists of scalars are treated as unordered sets; lists of dicts or lists are
/// merged position by position, padding `dest` with empty elements.  Two
/// different scalars at the same leaf are an error, never silently resolved.
pub fn combine(dest: &mut ConfigValue, src: ConfigValue) -> Result<(), ConfigError> {
    combine_at(dest, src, "")
}

fn combine_at(dest: &mut ConfigValue, src: ConfigValue, path: &str) -> Result<(), ConfigError> {
    match (dest, src) {
        (ConfigValue::Mapping(d), ConfigValue::Mapping(s)) => {
            for (key, val) in s {
                let key_path = child_path(path, &key);
                match d.get_mut(&key) {
                    Some(existing) => combine_at(existing, val, &key_path)?,
                    None => {
                        d.insert(key, val);
                    }
                }
            }
            Ok(())
        }
        (ConfigValue::Sequence(d), ConfigValue::Sequence(s)) => {
            match common_elem_kind(d.iter().chain(s.iter()), path)? {
                None => {}
                Some(ValueKind::Scalar) => {
                    for elem in s {
                        if !d.contains(&elem) {
                            d.push(elem);
                        }
                    }
                }
                Some(kind) => {
                    while d.len() < s.len() {
                        d.push(ConfigValue::empty(kind));
                    }
                    for (idx, val) in s.into_iter().enumerate() {
                        combine_at(&mut d[idx], val, &index_path(path, idx))?;
                    }
                }
            }
            Ok(())
        }
        (d @ ConfigValue::Mapping(_), s) | (d @ ConfigValue::Sequence(_), s) => {
            Err(ConfigError::KindMismatch {
                path: path.to_string(),
                dest: d.kind(),
                src: s.kind(),
            })
        }
        (d, s) => equal_or_conflict(d, &s, path),
    }
}

// ── add ───────────────────────────────────────────────────────────────────────

/// Deep merge where lists are concatenated and scalars must agree.
pub fn add(dest: &mut ConfigValue, src: ConfigValue) -> Result<(), ConfigError> {
    add_at(dest, src, "")
}

fn add_at(dest: &mut ConfigValue, src: ConfigValue, path: &str) -> Result<(), ConfigError> {
    match (dest, src) {
        (ConfigValue::Mapping(d), ConfigValue::Mapping(s)) => {
            for (key, val) in s {
                let key_path = child_path(path, &key);
                match d.get_mut(&key) {
                    Some(existing) => add_at(existing, val, &key_path)?,
                    None => {
                        d.insert(key, val);
                    }
                }
            }
            Ok(())
        }
        (ConfigValue::Sequence(d), ConfigValue::Sequence(s)) => {
            d.extend(s);
            Ok(())
        }
        (d @ ConfigValue::Mapping(_), s) | (d @ ConfigValue::Sequence(_), s) => {
            Err(ConfigError::KindMismatch {
                path: path.to_string(),
                dest: d.kind(),
                src: s.kind(),
            })
        }
        (d, s) => equal_or_conflict(d, &s, path),
    }
}

fn equal_or_conflict(dest: &ConfigValue, src: &ConfigValue, path: &str) -> Result<(), ConfigError> {
    if dest == src {
        Ok(())
    } else {
        Err(ConfigError::Conflict {
            path: path.to_string(),
            dest: dest.to_string(),
            src: src.to_string(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
