// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Region identities.
//!
//! A region is named by the 32-bit CRC-32C of its name, so every process
//! derives the same hash without coordination. The reserved values below
//! never come from user names in practice and carry fixed meanings.

/// No region; also the state of an unowned CPU.
pub const HASH_INVALID: u64 = 0;
/// A CPU owned by a process that has not entered any region.
pub const HASH_UNMARKED: u64 = 0x725e_8066;
/// Hash reported for epoch events.
pub const HASH_EPOCH: u64 = 0x66c9_143d;
/// The whole application, from profile start to stop.
pub const HASH_APP: u64 = 0x9d8b_8b0f;

/// Reflected Castagnoli polynomial.
const CRC32C_POLY: u32 = 0x82f6_3b78;

/// CRC-32C of `name`, widened to `u64`.
pub fn region_hash(name: &str) -> u64 {
    u64::from(crc32c(name.as_bytes()))
}

fn crc32c(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (CRC32C_POLY & mask);
        }
    }
    !crc
}

/// True when `hash` fits the 32 bits a status record stores.
pub(crate) fn is_valid_hash(hash: u64) -> bool {
    hash >> 32 == 0
}
