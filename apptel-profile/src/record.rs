// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Records exchanged through the record log.
//!
//! `RawRecord`, `ShortRegion` and `Layout` are the byte-exact shared ABI; the
//! consumer and producer must be built with the same constants.

use crate::error::Error;

/// Records one producer may buffer between two drains.
pub const MAX_RECORD: usize = 1024;

/// Short region aggregates one producer may buffer between two drains.
pub const MAX_REGION: usize = MAX_RECORD + 1;

/// Bytes the record log needs from its shared region.
pub const LAYOUT_SIZE: usize = core::mem::size_of::<Layout>();

/// Tag telling consumers how to read a record's `signal`.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// `signal` is the region hash.
    RegionEntry = 0,
    /// `signal` is the region hash.
    RegionExit,
    /// `signal` is the epoch count, starting at one.
    EpochCount,
    /// `signal` indexes the short region table drained with the record.
    ShortRegion,
    /// `signal` is a process id or CPU index, depending on the writer.
    Affinity,
    /// `signal` is the hash of the profile name.
    ProfileStart,
    /// `signal` is the hash of the profile name.
    ProfileStop,
    /// `signal` holds the bits of an `f64` number of seconds.
    Overhead,
}

impl TryFrom<i32> for Event {
    type Error = Error;

    fn try_from(tag: i32) -> Result<Self, Error> {
        Ok(match tag {
            0 => Event::RegionEntry,
            1 => Event::RegionExit,
            2 => Event::EpochCount,
            3 => Event::ShortRegion,
            4 => Event::Affinity,
            5 => Event::ProfileStart,
            6 => Event::ProfileStop,
            7 => Event::Overhead,
            _ => return Err(Error::Corrupt(format!("unknown event tag {tag}"))),
        })
    }
}

/// A drained event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Record {
    /// Seconds since the writer's time zero.
    pub time: f64,
    pub process: i32,
    pub event: Event,
    pub signal: u64,
}

impl Record {
    /// Seconds carried by an [`Event::Overhead`] record.
    pub fn overhead_seconds(&self) -> Option<f64> {
        (self.event == Event::Overhead).then(|| f64::from_bits(self.signal))
    }
}

impl TryFrom<RawRecord> for Record {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self, Error> {
        Ok(Record {
            time: raw.time,
            process: raw.process,
            event: Event::try_from(raw.event)?,
            signal: raw.signal,
        })
    }
}

/// Aggregate of every enter/exit pair of one region within a drain interval.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShortRegion {
    pub hash: u64,
    pub num_complete: i32,
    /// Seconds spent inside the region, summed over `num_complete` pairs.
    pub total_time: f64,
}

/// Shared form of [`Record`]; the tag stays an `i32` so that a corrupt value
/// is never read as an [`Event`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct RawRecord {
    pub time: f64,
    pub process: i32,
    pub event: i32,
    pub signal: u64,
}

impl RawRecord {
    pub fn new(time: f64, process: i32, event: Event, signal: u64) -> Self {
        Self {
            time,
            process,
            event: event as i32,
            signal,
        }
    }
}

/// The record log's view of its shared region.
#[repr(C)]
pub(crate) struct Layout {
    pub num_record: i32,
    pub record_table: [RawRecord; MAX_RECORD],
    pub num_region: i32,
    pub region_table: [ShortRegion; MAX_REGION],
}

const _: () = assert!(core::mem::size_of::<RawRecord>() == 24);
const _: () = assert!(core::mem::size_of::<ShortRegion>() == 24);
const _: () = assert!(LAYOUT_SIZE == 49192);
