// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};

/// Bits a hint may occupy.
pub const HINT_MASK: u64 = 0x3ff << 32;

const HINT_SHIFT: u32 = 32;

/// What a region is expected to spend its time on.
///
/// Each hint is a single bit in the upper half of a `u64`, which is part of
/// the shared ABI.
#[repr(u64)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegionHint {
    #[default]
    Unset = 0,
    Unknown = 1 << 32,
    Compute = 1 << 33,
    Memory = 1 << 34,
    Network = 1 << 35,
    Io = 1 << 36,
    Serial = 1 << 37,
    Parallel = 1 << 38,
    Ignore = 1 << 39,
    Inactive = 1 << 40,
    Spin = 1 << 41,
}

impl RegionHint {
    pub const ALL: [RegionHint; 11] = [
        RegionHint::Unset,
        RegionHint::Unknown,
        RegionHint::Compute,
        RegionHint::Memory,
        RegionHint::Network,
        RegionHint::Io,
        RegionHint::Serial,
        RegionHint::Parallel,
        RegionHint::Ignore,
        RegionHint::Inactive,
        RegionHint::Spin,
    ];

    /// Validates a hint received as raw bits.
    ///
    /// Rejects bits outside [`HINT_MASK`] and values with more than one bit set.
    pub fn from_bits(bits: u64) -> Result<Self> {
        if bits & !HINT_MASK != 0 || bits.count_ones() > 1 {
            return Err(Error::InvalidHint(bits));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|hint| hint.bits() == bits)
            .ok_or(Error::InvalidHint(bits))
    }

    pub const fn bits(self) -> u64 {
        self as u64
    }

    /// The 32-bit form kept in each status record.
    pub(crate) const fn to_stored(self) -> u32 {
        (self.bits() >> HINT_SHIFT) as u32
    }

    pub(crate) fn from_stored(stored: u32) -> Result<Self> {
        Self::from_bits(u64::from(stored) << HINT_SHIFT)
    }
}

impl TryFrom<u64> for RegionHint {
    type Error = Error;

    fn try_from(bits: u64) -> Result<Self> {
        Self::from_bits(bits)
    }
}
