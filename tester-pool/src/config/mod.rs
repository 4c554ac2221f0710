/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Configuration store: loading, normalising and merging YAML configuration.
//!
//! Every configuration file the pool touches (resources catalog, reservation
//! state, suite and scenario definitions) goes through this module.  Files are
//! parsed into a [`ConfigValue`] tree and *standardised* on the way in:
//!
//! * all mapping keys are lower-cased,
//! * every leaf value becomes a string (`3` → `"3"`, `true` → `"true"`),
//! * mappings are kept in sorted key order.
//!
//! Because the tree only ever holds strings, sequences and sorted mappings,
//! writing it back out and reading it again yields exactly the same tree.
//! Content hashes of resource items rely on that stability.
//!
//! ```text
//! resources.conf ──read()──► ConfigValue ──validate()──► Resources
//!                               ▲     │
//!                               └─────┘ overlay() / combine() / add()
//! ```

pub mod error;
pub mod main;
pub mod merge;

pub use error::{ConfigError, ValueKind};
pub use merge::{add, combine, overlay};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::schema::Schema;

/// Mapping node of a configuration tree.  `BTreeMap` keeps key order sorted so
/// serialisation and hashing are deterministic.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

// ── ConfigValue ───────────────────────────────────────────────────────────────

/// A standardised configuration node.
///
/// The closed set of shapes replaces run-time type inspection: matching and
/// merging code is written as exhaustive `match`es over these three variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Leaf value, always kept in its string form.
    Scalar(String),
    /// Ordered list of nodes.
    Sequence(Vec<ConfigValue>),
    /// Key → node map with lower-case keys.
    Mapping(ConfigMap),
}

impl ConfigValue {
    /// An empty mapping, the standardised form of an empty file.
    pub fn empty_mapping() -> Self {
        ConfigValue::Mapping(ConfigMap::new())
    }

    /// An empty node of the given shape, used to pad positional lists.
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Scalar => ConfigValue::Scalar(String::new()),
            ValueKind::Sequence => ConfigValue::Sequence(Vec::new()),
            ValueKind::Mapping => ConfigValue::Mapping(ConfigMap::new()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Scalar(_) => ValueKind::Scalar,
            ConfigValue::Sequence(_) => ValueKind::Sequence,
            ConfigValue::Mapping(_) => ValueKind::Mapping,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a dot-separated path of mapping keys, e.g. `"defaults.timeout"`.
    pub fn lookup(&self, dotted: &str) -> Option<&ConfigValue> {
        dotted
            .split('.')
            .try_fold(self, |node, key| node.as_mapping()?.get(key))
    }

    /// Convert a raw YAML value into its standardised form.
    fn from_yaml(raw: serde_yaml::Value) -> Self {
        use serde_yaml::Value;
        match raw {
            Value::Null => ConfigValue::Scalar(String::new()),
            Value::Bool(b) => ConfigValue::Scalar(b.to_string()),
            Value::Number(n) => ConfigValue::Scalar(n.to_string()),
            Value::String(s) => ConfigValue::Scalar(s),
            Value::Sequence(items) => {
                ConfigValue::Sequence(items.into_iter().map(Self::from_yaml).collect())
            }
            Value::Mapping(map) => ConfigValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (yaml_key_to_string(k).to_lowercase(), Self::from_yaml(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }
}

/// Render a YAML mapping key as a plain string.
fn yaml_key_to_string(key: serde_yaml::Value) -> String {
    use serde_yaml::Value;
    match key {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        Ok(ConfigValue::from_yaml(raw))
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Scalar(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Scalar(s)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(map: ConfigMap) -> Self {
        ConfigValue::Mapping(map)
    }
}

/// Compact flow-style rendering used in log lines and error messages, e.g.
/// `{imsi: '901700000000001', features: ['sms']}`.
impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Scalar(s) => write!(f, "'{}'", s),
            ConfigValue::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ConfigValue::Mapping(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// `parent.key`, or just `key` at the root.
pub(crate) fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// `parent[idx]`.
pub(crate) fn index_path(parent: &str, idx: usize) -> String {
    format!("{}[{}]", parent, idx)
}

/// Shape shared by every element of the given list nodes.
///
/// Returns `Ok(None)` when there are no elements at all and
/// [`ConfigError::MixedListTypes`] when two elements differ in shape.
pub(crate) fn common_elem_kind<'a>(
    items: impl IntoIterator<Item = &'a ConfigValue>,
    path: &str,
) -> Result<Option<ValueKind>, ConfigError> {
    let mut found: Option<ValueKind> = None;
    for item in items {
        let kind = item.kind();
        match found {
            None => found = Some(kind),
            Some(first) if first != kind => {
                return Err(ConfigError::MixedListTypes {
                    path: path.to_string(),
                    first,
                    second: kind,
                });
            }
            Some(_) => {}
        }
    }
    Ok(found)
}

// ── Standardisation ───────────────────────────────────────────────────────────

/// Normalise a tree built in code the same way [`read`] normalises files:
/// keys are lower-cased at every level.
///
/// Idempotent: `standardize(&standardize(v)) == standardize(v)`.
pub fn standardize(value: &ConfigValue) -> ConfigValue {
    match value {
        ConfigValue::Scalar(s) => ConfigValue::Scalar(s.clone()),
        ConfigValue::Sequence(items) => {
            ConfigValue::Sequence(items.iter().map(standardize).collect())
        }
        ConfigValue::Mapping(map) => ConfigValue::Mapping(
            map.iter()
                .map(|(k, v)| (k.to_lowercase(), standardize(v)))
                .collect(),
        ),
    }
}

/// Parse a YAML document.  An empty document yields an empty mapping.
pub fn from_str(content: &str) -> Result<ConfigValue, ConfigError> {
    parse_named(content, "<string>")
}

fn parse_named(content: &str, origin: &str) -> Result<ConfigValue, ConfigError> {
    let raw: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            origin: origin.to_string(),
            source,
        })?;
    if raw.is_null() {
        return Ok(ConfigValue::empty_mapping());
    }
    Ok(ConfigValue::from_yaml(raw))
}

/// Serialise a tree as block-style YAML with sorted keys.
pub fn tostr(value: &ConfigValue) -> Result<String, ConfigError> {
    serde_yaml::to_string(&standardize(value)).map_err(|source| ConfigError::Yaml {
        origin: "<serialize>".to_string(),
        source,
    })
}

// ── File I/O ──────────────────────────────────────────────────────────────────

/// Load and standardise the YAML file at `path`, validating it against
/// `schema` when one is given.
///
/// # Errors
/// I/O failures, YAML syntax errors and schema violations.
pub fn read(path: &Path, schema: Option<&Schema>) -> Result<ConfigValue, ConfigError> {
    debug!(path = %path.display(), "reading config");
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_named(&content, &path.display().to_string())?;
    if let Some(schema) = schema {
        schema.validate(&config)?;
    }
    Ok(config)
}

/// Like [`read`] without a schema, but a missing file yields an empty mapping.
pub fn read_or_empty(path: &Path) -> Result<ConfigValue, ConfigError> {
    if !path.exists() {
        return Ok(ConfigValue::empty_mapping());
    }
    read(path, None)
}

/// Write `value` to `path` in the same YAML dialect [`read`] accepts.
pub fn write(path: &Path, value: &ConfigValue) -> Result<(), ConfigError> {
    let content = tostr(value)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── times: N replication ──────────────────────────────────────────────────────

/// Expand `times: N` directives: in every top-level list, an item carrying
/// `times: N` is replaced in place by `N` copies of itself without the
/// `times` key.
///
/// ```text
/// {modem: [{times: 2, type: x}, {type: y}]}
///   → {modem: [{type: x}, {type: x}, {type: y}]}
/// ```
///
/// # Errors
/// [`ConfigError::InvalidTimes`] if a `times` value is not an integer ≥ 1.
pub fn replicate_times(config: &ConfigValue) -> Result<ConfigValue, ConfigError> {
    let ConfigValue::Mapping(map) = config else {
        return Ok(config.clone());
    };

    let mut out = ConfigMap::new();
    for (kind, value) in map {
        let ConfigValue::Sequence(items) = value else {
            out.insert(kind.clone(), value.clone());
            continue;
        };

        let mut expanded = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let ConfigValue::Mapping(fields) = item else {
                expanded.push(item.clone());
                continue;
            };
            let mut fields = fields.clone();
            let times = match fields.remove("times") {
                None => 1,
                Some(raw) => parse_times(&raw, &index_path(kind, idx))?,
            };
            expanded.extend(std::iter::repeat(ConfigValue::Mapping(fields)).take(times));
        }
        out.insert(kind.clone(), ConfigValue::Sequence(expanded));
    }
    Ok(ConfigValue::Mapping(out))
}

fn parse_times(raw: &ConfigValue, path: &str) -> Result<usize, ConfigError> {
    raw.as_str()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1)
        .ok_or_else(|| ConfigError::InvalidTimes {
            path: path.to_string(),
            value: raw.to_string(),
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    // ── Standardisation ───────────────────────────────────────────────────────

    #[test]
    fn leaves_become_strings_and_keys_lowercase() {
        let v = from_str("Modem:\n  - IMSI: 901700000000001\n    Enabled: true\n").unwrap();
        let modem = &v.as_mapping().unwrap()["modem"].as_sequence().unwrap()[0];
        let fields = modem.as_mapping().unwrap();
        assert_eq!(fields["imsi"], ConfigValue::from("901700000000001"));
        assert_eq!(fields["enabled"], ConfigValue::from("true"));
    }

    #[test]
    fn standardize_is_idempotent() {
        let v = from_str("A: {B: [1, 2, {C: x}]}\nd: 3.5\n").unwrap();
        let once = standardize(&v);
        assert_eq!(standardize(&once), once);
    }

    #[test]
    fn tostr_round_trip_is_stable() {
        let v = from_str("bts:\n- addr: 10.42.42.114\n  num_trx: 1\n  label: x\n").unwrap();
        let text = tostr(&v).unwrap();
        let again = from_str(&text).unwrap();
        assert_eq!(again, v);
        assert_eq!(tostr(&again).unwrap(), text);
    }

    #[test]
    fn empty_document_is_empty_mapping() {
        assert_eq!(from_str("").unwrap(), ConfigValue::empty_mapping());
    }

    #[test]
    fn lookup_follows_dotted_path() {
        let v = from_str("defaults:\n  timeout: 60s\n").unwrap();
        assert_eq!(v.lookup("defaults.timeout"), Some(&ConfigValue::from("60s")));
        assert!(v.lookup("defaults.missing").is_none());
    }

    #[test]
    fn display_is_compact_flow_style() {
        let v = from_str("{type: sysmo, ciphers: [a5_0]}").unwrap();
        assert_eq!(v.to_string(), "{ciphers: ['a5_0'], type: 'sysmo'}");
    }

    // ── File I/O ──────────────────────────────────────────────────────────────

    #[test]
    fn write_then_read_preserves_tree() {
        let v = from_str("modem:\n- imsi: '001'\n  ki: 00112233\n").unwrap();
        let f = NamedTempFile::new().unwrap();
        write(f.path(), &v).unwrap();
        assert_eq!(read(f.path(), None).unwrap(), v);
    }

    #[test]
    fn missing_file_is_an_error_for_read() {
        let result = read(Path::new("/nonexistent/resources.conf"), None);
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn missing_file_is_empty_for_read_or_empty() {
        let v = read_or_empty(Path::new("/nonexistent/reserved.state")).unwrap();
        assert_eq!(v, ConfigValue::empty_mapping());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(matches!(read(f.path(), None), Err(ConfigError::Yaml { .. })));
    }

    // ── replicate_times ───────────────────────────────────────────────────────

    #[test]
    fn times_expands_into_copies_without_times_key() {
        let v = from_str("modem: [{times: 3, type: x}]").unwrap();
        let out = replicate_times(&v).unwrap();
        let list = out.as_mapping().unwrap()["modem"].as_sequence().unwrap();
        assert_eq!(list.len(), 3);
        for item in list {
            let fields = item.as_mapping().unwrap();
            assert_eq!(fields.get("type"), Some(&ConfigValue::from("x")));
            assert!(!fields.contains_key("times"));
        }
    }

    #[test]
    fn times_keeps_position_between_neighbours() {
        let v = from_str("bts: [{type: a}, {type: b, times: 2}, {type: c}]").unwrap();
        let out = replicate_times(&v).unwrap();
        let types: Vec<_> = out.as_mapping().unwrap()["bts"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|i| i.as_mapping().unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types, vec!["a", "b", "b", "c"]);
    }

    #[test]
    fn times_zero_is_rejected() {
        let v = from_str("modem: [{times: 0}]").unwrap();
        assert!(matches!(
            replicate_times(&v),
            Err(ConfigError::InvalidTimes { .. })
        ));
    }

    #[test]
    fn times_does_not_touch_input() {
        let v = from_str("modem: [{times: 2}]").unwrap();
        let _ = replicate_times(&v).unwrap();
        assert_eq!(v.as_mapping().unwrap()["modem"].as_sequence().unwrap().len(), 1);
    }
}
