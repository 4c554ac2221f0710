/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Leaf value types understood by the schema validator.
//!
//! Every leaf in a standardised configuration tree is a string; a
//! [`TypeTag`] decides whether that string is acceptable for a given path.

use std::sync::LazyLock;

use regex::Regex;

static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").expect("IPv4 regex"));
static HWADDR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-fA-F]{2}:){5}[0-9a-fA-F]{2}$").expect("hardware address regex")
});
static IMSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6,15}$").expect("IMSI regex"));
static KI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").expect("KI regex"));
static MSISDN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,15}$").expect("MSISDN regex"));

const BANDS: &[&str] = &["GSM-900", "GSM-1800", "GSM-1900"];
const AUTH_ALGOS: &[&str] = &["none", "xor", "comp128v1", "comp128v2", "comp128v3", "milenage"];
const CIPHERS: &[&str] = &[
    "a5_0", "a5_1", "a5_2", "a5_3", "a5_4", "a5_5", "a5_6", "a5_7",
];
const MODEM_FEATURES: &[&str] = &["sms", "gprs", "voice", "ussd", "sim", "2g", "3g", "4g"];
const PHY_CHAN_CONFIGS: &[&str] = &[
    "CCCH",
    "CCCH+SDCCH4",
    "TCH/F",
    "TCH/H",
    "SDCCH8",
    "PDCH",
    "TCH/F_PDCH",
    "CCCH+SDCCH4+CBCH",
    "SDCCH8+CBCH",
    "TCH/F_TCH/H_PDCH",
];
const CHAN_ALLOCATORS: &[&str] = &["ascending", "descending"];
const GPRS_MODES: &[&str] = &["none", "gprs", "egprs"];
const CODECS: &[&str] = &["hr1", "hr2", "hr3", "fr1", "fr2", "fr3"];
const TRX_CLOCK_REFS: &[&str] = &["internal", "external", "gspdo"];

// ── TypeTag ───────────────────────────────────────────────────────────────────

/// Type of a schema leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Str,
    Int,
    Uint,
    Uint8,
    Uint16,
    /// `true`/`false`/`yes`/`no`/`on`/`off`, any case.
    BoolStr,
    /// `times: N` replication count, N ≥ 1.
    Times,
    Band,
    Ipv4,
    /// Six colon-separated hex octets.
    HwAddr,
    Imsi,
    /// 128-bit subscriber key as 32 hex digits.
    Ki,
    Msisdn,
    AuthAlgo,
    Cipher,
    ModemFeature,
    PhyChanConfig,
    ChanAllocator,
    GprsMode,
    Codec,
    OsmoTrxClockRef,
    LteTransmissionMode,
}

impl TypeTag {
    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Str => "str",
            TypeTag::Int => "int",
            TypeTag::Uint => "uint",
            TypeTag::Uint8 => "uint8",
            TypeTag::Uint16 => "uint16",
            TypeTag::BoolStr => "bool_str",
            TypeTag::Times => "times",
            TypeTag::Band => "band",
            TypeTag::Ipv4 => "ipv4",
            TypeTag::HwAddr => "hwaddr",
            TypeTag::Imsi => "imsi",
            TypeTag::Ki => "ki",
            TypeTag::Msisdn => "msisdn",
            TypeTag::AuthAlgo => "auth_algo",
            TypeTag::Cipher => "cipher",
            TypeTag::ModemFeature => "modem_feature",
            TypeTag::PhyChanConfig => "phy_chan_config",
            TypeTag::ChanAllocator => "chan_allocator",
            TypeTag::GprsMode => "gprs_mode",
            TypeTag::Codec => "codec",
            TypeTag::OsmoTrxClockRef => "osmo_trx_clock_ref",
            TypeTag::LteTransmissionMode => "lte_transmission_mode",
        }
    }

    /// Check `value` against this type.  `Err` carries a short reason.
    pub fn check(self, value: &str) -> Result<(), String> {
        match self {
            TypeTag::Str => Ok(()),
            TypeTag::Int => parse_int(value).map(|_| ()),
            TypeTag::Uint => in_range(value, 0, i64::MAX),
            TypeTag::Uint8 => in_range(value, 0, 255),
            TypeTag::Uint16 => in_range(value, 0, 65535),
            TypeTag::BoolStr => str_to_bool(value).map(|_| ()),
            TypeTag::Times => in_range(value, 1, i64::MAX),
            TypeTag::Band => one_of(value, BANDS),
            TypeTag::Ipv4 => ipv4(value),
            TypeTag::HwAddr => matches_re(value, &HWADDR_RE),
            TypeTag::Imsi => matches_re(value, &IMSI_RE),
            TypeTag::Ki => matches_re(value, &KI_RE),
            TypeTag::Msisdn => matches_re(value, &MSISDN_RE),
            TypeTag::AuthAlgo => one_of(value, AUTH_ALGOS),
            TypeTag::Cipher => one_of(value, CIPHERS),
            TypeTag::ModemFeature => one_of(value, MODEM_FEATURES),
            TypeTag::PhyChanConfig => one_of(value, PHY_CHAN_CONFIGS),
            TypeTag::ChanAllocator => one_of(value, CHAN_ALLOCATORS),
            TypeTag::GprsMode => one_of(value, GPRS_MODES),
            TypeTag::Codec => one_of(value, CODECS),
            TypeTag::OsmoTrxClockRef => one_of(value, TRX_CLOCK_REFS),
            TypeTag::LteTransmissionMode => in_range(value, 1, 4),
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Checkers ──────────────────────────────────────────────────────────────────

fn parse_int(value: &str) -> Result<i64, String> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| "not an integer".to_string())
}

fn in_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let n = parse_int(value)?;
    if n < min || n > max {
        return Err(format!("out of range {}..={}", min, max));
    }
    Ok(())
}

fn one_of(value: &str, allowed: &[&str]) -> Result<(), String> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(format!("expected one of {}", allowed.join(", ")))
    }
}

fn matches_re(value: &str, re: &Regex) -> Result<(), String> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err("invalid format".to_string())
    }
}

fn ipv4(value: &str) -> Result<(), String> {
    matches_re(value, &IPV4_RE)?;
    if value.split('.').all(|octet| octet.parse::<u8>().is_ok()) {
        Ok(())
    } else {
        Err("octet out of range 0..=255".to_string())
    }
}

/// Interpret a boolean-ish config string.  An empty value is `false`.
pub fn str_to_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_uppercase().as_str() {
        "" | "FALSE" | "NO" | "OFF" | "0" => Ok(false),
        "TRUE" | "YES" | "ON" | "1" => Ok(true),
        _ => Err("not a boolean".to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
