/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Persistent shared counters (MSISDN, LAC, RAC, cell id, BVCI).
//!
//! Unlike reservations these values are never given back: every call hands
//! out the next value and stores it as the new last value.  The stored file
//! is `last_used_<token>.state` holding one scalar as plain text.  Without a
//! file the counter starts from its seed, so the first value handed out is
//! the seed's successor.

use std::fmt;
use std::str::FromStr;

use crate::schema::TypeTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Msisdn,
    Lac,
    Rac,
    CellId,
    Bvci,
}

impl Counter {
    pub const ALL: [Counter; 5] = [
        Counter::Msisdn,
        Counter::Lac,
        Counter::Rac,
        Counter::CellId,
        Counter::Bvci,
    ];

    /// Name used in the state file name and on the command line.
    pub fn token(self) -> &'static str {
        match self {
            Counter::Msisdn => "msisdn",
            Counter::Lac => "lac",
            Counter::Rac => "rac",
            Counter::CellId => "cellid",
            Counter::Bvci => "bvci",
        }
    }

    /// Last value assumed when no state file exists yet.
    pub fn seed(self) -> &'static str {
        match self {
            Counter::Msisdn => "1000",
            Counter::Lac | Counter::Rac | Counter::CellId => "1",
            Counter::Bvci => "2",
        }
    }

    /// Type the stored value must satisfy.
    pub fn tag(self) -> TypeTag {
        match self {
            Counter::Msisdn => TypeTag::Msisdn,
            Counter::Rac => TypeTag::Uint8,
            Counter::Lac | Counter::CellId | Counter::Bvci => TypeTag::Uint16,
        }
    }

    /// Successor of a validated `last` value.
    ///
    /// * MSISDN: +1 keeping the leading-zero width (`0099` → `0100`),
    /// * LAC: uint16 wrap, 0 skipped (0 means "MS detached"),
    /// * RAC: uint8 wrap, 0 skipped,
    /// * cell id: uint16 wrap,
    /// * BVCI: uint16, 0 and 1 are reserved so 65535 wraps to 2.
    pub fn increment(self, last: &str) -> Result<String, String> {
        let n: u64 = last
            .trim()
            .parse()
            .map_err(|_| format!("not a number: {last:?}"))?;
        let succ = n
            .checked_add(1)
            .ok_or_else(|| format!("value out of range: {last:?}"))?;
        let next = match self {
            Counter::Msisdn => {
                return Ok(format!("{:0width$}", succ, width = last.trim().len()));
            }
            Counter::Lac => skip_zero(succ % (1 << 16)),
            Counter::Rac => skip_zero(succ % (1 << 8)),
            Counter::CellId => succ % (1 << 16),
            Counter::Bvci => {
                if n < u64::from(u16::MAX) {
                    succ
                } else {
                    2
                }
            }
        };
        Ok(next.to_string())
    }
}

fn skip_zero(v: u64) -> u64 {
    if v == 0 {
        1
    } else {
        v
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Counter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Counter::ALL
            .into_iter()
            .find(|c| c.token() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Counter::ALL.iter().map(|c| c.token()).collect();
                format!("unknown counter {s:?}, expected one of {}", names.join(", "))
            })
    }
}
