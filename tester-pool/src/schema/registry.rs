/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Static table of resource kinds and the schemas built from it.
//!
//! Every kind of reservable resource is a [`ResourceKind`] variant with a
//! compile-time attribute list.  [`SchemaRegistry::builtin`] folds those lists
//! into one resources schema with the same conflict-checked combine that
//! [`SchemaRegistry::register_resource_schema`] uses for extensions, so a
//! kind added later cannot silently redefine an existing attribute.
//!
//! Three schemas are derived from the registry:
//!
//! | Schema | Validates | Extra entries |
//! |---|---|---|
//! | [`resources_schema`](SchemaRegistry::resources_schema) | `resources.conf`, reservation requests | - |
//! | [`want_schema`](SchemaRegistry::want_schema) | suite `resources` / `modifiers` sections | `<kind>[].times` |
//! | [`suite_schema`](SchemaRegistry::suite_schema) | whole suite and scenario files | `resources.*`, `modifiers.*`, `defaults.*`, `config.*` |

use std::collections::BTreeSet;

use tracing::debug;

use super::{Schema, SchemaError, TypeTag};

// ── ResourceKind ──────────────────────────────────────────────────────────────

/// Built-in resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    IpAddress,
    RunNode,
    Bts,
    Arfcn,
    Modem,
    OsmoconPhone,
    Enb,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::IpAddress,
        ResourceKind::RunNode,
        ResourceKind::Bts,
        ResourceKind::Arfcn,
        ResourceKind::Modem,
        ResourceKind::OsmoconPhone,
        ResourceKind::Enb,
    ];

    /// Top-level key of this kind in `resources.conf`.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::IpAddress => "ip_address",
            ResourceKind::RunNode => "run_node",
            ResourceKind::Bts => "bts",
            ResourceKind::Arfcn => "arfcn",
            ResourceKind::Modem => "modem",
            ResourceKind::OsmoconPhone => "osmocon_phone",
            ResourceKind::Enb => "enb",
        }
    }

    /// Attribute paths of one item of this kind, relative to `<kind>[]`.
    pub fn attributes(self) -> &'static [(&'static str, TypeTag)] {
        match self {
            ResourceKind::IpAddress => &[("addr", TypeTag::Ipv4)],
            ResourceKind::RunNode => &[
                ("run_type", TypeTag::Str),
                ("run_addr", TypeTag::Ipv4),
                ("ssh_user", TypeTag::Str),
                ("ssh_addr", TypeTag::Ipv4),
                ("run_label", TypeTag::Str),
                ("label", TypeTag::Str),
            ],
            ResourceKind::Bts => &[
                ("label", TypeTag::Str),
                ("type", TypeTag::Str),
                ("addr", TypeTag::Ipv4),
                ("band", TypeTag::Band),
                ("direct_pcu", TypeTag::BoolStr),
                ("ipa_unit_id", TypeTag::Uint),
                ("remote_user", TypeTag::Str),
                ("num_trx", TypeTag::Uint),
                ("max_trx", TypeTag::Uint),
                ("channel_allocator", TypeTag::ChanAllocator),
                ("gprs_mode", TypeTag::GprsMode),
                ("ciphers[]", TypeTag::Cipher),
                ("trx_list[].addr", TypeTag::Ipv4),
                ("trx_list[].hw_addr", TypeTag::HwAddr),
                ("trx_list[].net_device", TypeTag::Str),
                ("trx_list[].nominal_power", TypeTag::Uint),
                ("trx_list[].max_power_red", TypeTag::Uint),
                ("trx_list[].timeslot_list[].phys_chan_config", TypeTag::PhyChanConfig),
                ("osmo_trx.launch_trx", TypeTag::BoolStr),
                ("osmo_trx.type", TypeTag::Str),
                ("osmo_trx.clock_reference", TypeTag::OsmoTrxClockRef),
                ("osmo_trx.trx_ip", TypeTag::Ipv4),
                ("osmo_trx.remote_user", TypeTag::Str),
                ("osmo_trx.dev_args", TypeTag::Str),
                ("osmo_trx.multi_arfcn", TypeTag::BoolStr),
            ],
            ResourceKind::Arfcn => &[("arfcn", TypeTag::Int), ("band", TypeTag::Band)],
            ResourceKind::Modem => &[
                ("type", TypeTag::Str),
                ("label", TypeTag::Str),
                ("path", TypeTag::Str),
                ("imsi", TypeTag::Imsi),
                ("ki", TypeTag::Ki),
                ("auth_algo", TypeTag::AuthAlgo),
                ("apn_ipaddr", TypeTag::Ipv4),
                ("remote_user", TypeTag::Str),
                ("addr", TypeTag::Ipv4),
                ("ciphers[]", TypeTag::Cipher),
                ("features[]", TypeTag::ModemFeature),
            ],
            ResourceKind::OsmoconPhone => &[("serial_device", TypeTag::Str)],
            ResourceKind::Enb => &[
                ("label", TypeTag::Str),
                ("type", TypeTag::Str),
                ("remote_user", TypeTag::Str),
                ("addr", TypeTag::Ipv4),
                ("num_prb", TypeTag::Uint),
                ("transmission_mode", TypeTag::LteTransmissionMode),
                ("tx_gain", TypeTag::Uint),
                ("rx_gain", TypeTag::Uint),
                ("rf_dev_type", TypeTag::Str),
                ("rf_dev_args", TypeTag::Str),
                ("run_node.run_type", TypeTag::Str),
                ("run_node.run_addr", TypeTag::Ipv4),
                ("run_node.ssh_user", TypeTag::Str),
                ("run_node.ssh_addr", TypeTag::Ipv4),
            ],
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── SchemaRegistry ────────────────────────────────────────────────────────────

/// Schemas for resources and suite configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    /// Every kind with at least one registered attribute.
    kinds: BTreeSet<String>,
    resources: Schema,
    /// Suite-level entries outside `resources` / `modifiers`.
    config: Schema,
}

impl SchemaRegistry {
    /// Empty registry with only the fixed suite-level entries.
    pub fn new() -> Self {
        let mut config = Schema::new();
        // Fresh schema, cannot conflict.
        let _ = config.insert("defaults.timeout", TypeTag::Str);
        Self {
            kinds: BTreeSet::new(),
            resources: Schema::new(),
            config,
        }
    }

    /// Registry populated from the [`ResourceKind`] table.
    pub fn builtin() -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for kind in ResourceKind::ALL {
            registry.register_resource_schema(kind.name(), kind.attributes())?;
        }
        debug!(
            kinds = registry.kinds.len(),
            entries = registry.resources.len(),
            "resource schema built"
        );
        Ok(registry)
    }

    /// Add attributes for resource `kind` (new or existing).
    ///
    /// # Errors
    /// [`SchemaError::Conflict`] if an attribute is already registered with a
    /// different type; the registry is unchanged in that case.
    pub fn register_resource_schema(
        &mut self,
        kind: &str,
        attributes: &[(&str, TypeTag)],
    ) -> Result<(), SchemaError> {
        let prefix = format!("{}[]", kind);
        let fragment = Schema::from_entries(attributes.iter().copied())?.prefixed(&prefix);
        self.resources.combine(&fragment)?;
        self.kinds.insert(kind.to_string());
        Ok(())
    }

    /// Add suite-level configuration attributes under `config.<section>`.
    pub fn register_config_schema(
        &mut self,
        section: &str,
        attributes: &[(&str, TypeTag)],
    ) -> Result<(), SchemaError> {
        let prefix = format!("config.{}", section);
        let fragment = Schema::from_entries(attributes.iter().copied())?.prefixed(&prefix);
        self.config.combine(&fragment)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(String::as_str)
    }

    /// Schema of `resources.conf` and of reservation requests.
    pub fn resources_schema(&self) -> &Schema {
        &self.resources
    }

    /// Resources schema plus `<kind>[].times` for every kind.
    pub fn want_schema(&self) -> Schema {
        let mut schema = self.resources.clone();
        for kind in &self.kinds {
            // `times` is never a registered attribute name of a kind.
            let _ = schema.insert(&format!("{}[].times", kind), TypeTag::Times);
        }
        schema
    }

    /// Schema of a complete suite or scenario file.
    pub fn suite_schema(&self) -> Result<Schema, SchemaError> {
        let want = self.want_schema();
        let mut schema = self.config.clone();
        schema.combine(&want.prefixed("resources"))?;
        schema.combine(&want.prefixed("modifiers"))?;
        Ok(schema)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_str;

    #[test]
    fn builtin_registers_every_kind() {
        let reg = SchemaRegistry::builtin().unwrap();
        let kinds: Vec<_> = reg.kinds().collect();
        for kind in ResourceKind::ALL {
            assert!(kinds.contains(&kind.name()), "missing kind {kind}");
        }
        assert_eq!(
            reg.resources_schema().get("modem[].imsi"),
            Some(TypeTag::Imsi)
        );
        assert_eq!(
            reg.resources_schema().get("bts[].trx_list[].hw_addr"),
            Some(TypeTag::HwAddr)
        );
    }

    #[test]
    fn times_is_only_in_want_schema() {
        let reg = SchemaRegistry::builtin().unwrap();
        assert!(reg.resources_schema().get("modem[].times").is_none());
        assert_eq!(reg.want_schema().get("modem[].times"), Some(TypeTag::Times));
    }

    #[test]
    fn suite_schema_nests_want_under_resources_and_modifiers() {
        let reg = SchemaRegistry::builtin().unwrap();
        let schema = reg.suite_schema().unwrap();
        let suite = from_str(
            r#"
resources:
  modem: [{times: 2, features: [sms]}]
  bts: [{type: osmo-bts-sysmo}]
modifiers:
  bts: [{num_trx: 2}]
defaults:
  timeout: 60s
"#,
        )
        .unwrap();
        schema.validate(&suite).unwrap();
    }

    #[test]
    fn registering_conflicting_attribute_fails() {
        let mut reg = SchemaRegistry::builtin().unwrap();
        let err = reg
            .register_resource_schema("modem", &[("imsi", TypeTag::Str)])
            .unwrap_err();
        assert!(matches!(err, SchemaError::Conflict { .. }));
        assert_eq!(
            reg.resources_schema().get("modem[].imsi"),
            Some(TypeTag::Imsi)
        );
    }

    #[test]
    fn registering_new_kind_extends_schemas() {
        let mut reg = SchemaRegistry::builtin().unwrap();
        reg.register_resource_schema("sdr", &[("serial", TypeTag::Str)])
            .unwrap();
        assert_eq!(reg.want_schema().get("sdr[].times"), Some(TypeTag::Times));
    }

    #[test]
    fn config_schema_extension_point() {
        let mut reg = SchemaRegistry::builtin().unwrap();
        reg.register_config_schema("bsc", &[("net.codec_list[]", TypeTag::Codec)])
            .unwrap();
        let schema = reg.suite_schema().unwrap();
        assert_eq!(
            schema.get("config.bsc.net.codec_list[]"),
            Some(TypeTag::Codec)
        );
    }
}
