// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! C ABI over memory mapped by the caller.
//!
//! Blocks passed in have the same shape as every shared region: a
//! `HEADER_SIZE` header holding the lock word, then the payload. Use the
//! `*_buffer_size` functions to size them. Functions returning `c_int` return
//! 0 on success and -1 on failure; failures are logged.

use crate::error::Result;
use crate::hint::RegionHint;
use crate::record::{ShortRegion, MAX_RECORD, MAX_REGION};
use crate::record_log::RecordLog;
use crate::status::StatusTable;
use crate::time::Timestamp;
use apptel_shm::{RawRegion, SharedRegion, HEADER_SIZE};
use core::ffi::c_int;
use std::sync::Arc;
use tracing::warn;

/// A drained record with its event tag as a plain integer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ApptelRecord {
    pub time: f64,
    pub process: i32,
    pub event: i32,
    pub signal: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApptelTimespec {
    pub sec: i64,
    pub nsec: i64,
}

impl From<ApptelTimespec> for Timestamp {
    fn from(ts: ApptelTimespec) -> Self {
        Timestamp::new(ts.sec, ts.nsec)
    }
}

fn to_code(op: &'static str, result: Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(err) => {
            warn!(%err, op, "apptel call failed");
            -1
        }
    }
}

/// # Safety
/// `base` must be null or point to `len` bytes that outlive the returned
/// region.
unsafe fn raw_region(base: *mut u8, len: usize) -> Option<Arc<dyn SharedRegion>> {
    match RawRegion::from_raw_parts(base, len) {
        Ok(region) => Some(Arc::new(region)),
        Err(err) => {
            warn!(%err, "rejected caller memory");
            None
        }
    }
}

// -- Record log ---------------------------------------------------------------

/// Bytes to map for one record log, header included.
#[no_mangle]
pub extern "C" fn apptel_record_log_buffer_size() -> usize {
    HEADER_SIZE + RecordLog::buffer_size()
}

/// Returns a new record log over `base`, or null.
///
/// # Safety
/// `base` must point to `len` zero-initialized (or previously used by a
/// record log), writable, 8-byte aligned bytes that stay mapped until
/// [`apptel_record_log_free`].
#[no_mangle]
pub unsafe extern "C" fn apptel_record_log_new(base: *mut u8, len: usize) -> *mut RecordLog {
    let Some(region) = raw_region(base, len) else {
        return core::ptr::null_mut();
    };
    match RecordLog::new(region) {
        Ok(log) => Box::into_raw(Box::new(log)),
        Err(err) => {
            warn!(%err, "could not create record log");
            core::ptr::null_mut()
        }
    }
}

/// # Safety
/// `log` must be null or come from [`apptel_record_log_new`] and not be used
/// afterwards.
#[no_mangle]
pub unsafe extern "C" fn apptel_record_log_free(log: *mut RecordLog) {
    if !log.is_null() {
        drop(Box::from_raw(log));
    }
}

/// # Safety
/// `log` must be a live handle from [`apptel_record_log_new`] not used
/// concurrently by another thread.
#[no_mangle]
pub unsafe extern "C" fn apptel_record_log_set_process(log: &mut RecordLog, process: i32) -> c_int {
    to_code("set_process", log.set_process(process))
}

/// # Safety
/// See [`apptel_record_log_set_process`].
#[no_mangle]
pub unsafe extern "C" fn apptel_record_log_set_time_zero(
    log: &mut RecordLog,
    time: ApptelTimespec,
) -> c_int {
    to_code("set_time_zero", log.set_time_zero(time.into()))
}

/// # Safety
/// See [`apptel_record_log_set_process`].
#[no_mangle]
pub unsafe extern "C" fn apptel_record_log_enter(
    log: &mut RecordLog,
    hash: u64,
    time: ApptelTimespec,
) -> c_int {
    to_code("enter", log.enter(hash, time.into()))
}

/// # Safety
/// See [`apptel_record_log_set_process`].
#[no_mangle]
pub unsafe extern "C" fn apptel_record_log_exit(
    log: &mut RecordLog,
    hash: u64,
    time: ApptelTimespec,
) -> c_int {
    to_code("exit", log.exit(hash, time.into()))
}

/// # Safety
/// See [`apptel_record_log_set_process`].
#[no_mangle]
pub unsafe extern "C" fn apptel_record_log_epoch(log: &mut RecordLog, time: ApptelTimespec) -> c_int {
    to_code("epoch", log.epoch(time.into()))
}

/// Drains the log into caller arrays.
///
/// The arrays must hold at least `MAX_RECORD` records and `MAX_REGION`
/// regions; smaller capacities fail without draining.
///
/// # Safety
/// `records` and `regions` must be valid for writes of `record_cap` and
/// `region_cap` elements; `num_records` and `num_regions` must be writable.
#[no_mangle]
pub unsafe extern "C" fn apptel_record_log_dump(
    log: &RecordLog,
    records: *mut ApptelRecord,
    record_cap: usize,
    num_records: *mut usize,
    regions: *mut ShortRegion,
    region_cap: usize,
    num_regions: *mut usize,
) -> c_int {
    if records.is_null() || regions.is_null() || num_records.is_null() || num_regions.is_null() {
        warn!("null output passed to apptel_record_log_dump");
        return -1;
    }
    if record_cap < MAX_RECORD || region_cap < MAX_REGION {
        warn!(record_cap, region_cap, "output arrays too small to drain");
        return -1;
    }
    let mut drained = Vec::new();
    let mut short_regions = Vec::new();
    if to_code("dump", log.dump(&mut drained, &mut short_regions)) != 0 {
        return -1;
    }
    for (idx, record) in drained.iter().enumerate() {
        records.add(idx).write(ApptelRecord {
            time: record.time,
            process: record.process,
            event: record.event as i32,
            signal: record.signal,
        });
    }
    core::ptr::copy_nonoverlapping(short_regions.as_ptr(), regions, short_regions.len());
    num_records.write(drained.len());
    num_regions.write(short_regions.len());
    0
}

// -- Status table -------------------------------------------------------------

/// Bytes to map for a status table of `num_cpu` CPUs, header included, or 0
/// when that size does not fit in `usize`.
#[no_mangle]
pub extern "C" fn apptel_status_buffer_size(num_cpu: usize) -> usize {
    StatusTable::buffer_size(num_cpu)
        .and_then(|size| size.checked_add(HEADER_SIZE))
        .unwrap_or(0)
}

/// Returns a status table over `base`, or null. With `initialize` every CPU
/// is marked unowned; otherwise the contents are used as they are.
///
/// # Safety
/// `base` must point to `len` writable, 64-byte aligned bytes that stay
/// mapped until [`apptel_status_free`].
#[no_mangle]
pub unsafe extern "C" fn apptel_status_new(
    base: *mut u8,
    len: usize,
    num_cpu: usize,
    initialize: bool,
) -> *mut StatusTable {
    let Some(region) = raw_region(base, len) else {
        return core::ptr::null_mut();
    };
    let table = if initialize {
        StatusTable::create(num_cpu, region)
    } else {
        StatusTable::attach(num_cpu, region)
    };
    match table {
        Ok(table) => Box::into_raw(Box::new(table)),
        Err(err) => {
            warn!(%err, "could not create status table");
            core::ptr::null_mut()
        }
    }
}

/// # Safety
/// `table` must be null or come from [`apptel_status_new`] and not be used
/// afterwards.
#[no_mangle]
pub unsafe extern "C" fn apptel_status_free(table: *mut StatusTable) {
    if !table.is_null() {
        drop(Box::from_raw(table));
    }
}

/// `hint` is one of the hint bit values.
///
/// # Safety
/// `table` must be a live handle from [`apptel_status_new`].
#[no_mangle]
pub unsafe extern "C" fn apptel_status_set_hash(
    table: &StatusTable,
    cpu: usize,
    hash: u64,
    hint: u64,
) -> c_int {
    to_code(
        "set_hash",
        RegionHint::from_bits(hint).and_then(|hint| table.set_hash(cpu, hash, hint)),
    )
}

/// Writes the hash of the region running on `cpu` to `hash`.
///
/// # Safety
/// `table` must be a live handle from [`apptel_status_new`] and `hash` must
/// be writable.
#[no_mangle]
pub unsafe extern "C" fn apptel_status_get_hash(
    table: &StatusTable,
    cpu: usize,
    hash: *mut u64,
) -> c_int {
    if hash.is_null() {
        return -1;
    }
    to_code(
        "get_hash",
        table.get_hash(cpu).map(|value| hash.write(value)),
    )
}

/// Completed fraction of the work on `cpu`; NaN when no work is tracked or
/// `cpu` is invalid.
///
/// # Safety
/// `table` must be a live handle from [`apptel_status_new`].
#[no_mangle]
pub unsafe extern "C" fn apptel_status_get_work_progress(
    table: &StatusTable,
    cpu: usize,
) -> f64 {
    match table.get_work_progress(cpu) {
        Ok(progress) => progress.unwrap_or(f64::NAN),
        Err(err) => {
            warn!(%err, "get_work_progress failed");
            f64::NAN
        }
    }
}

// -- Logging ------------------------------------------------------------------

/// Installs the stderr subscriber; see [`crate::logging::init_from_env`].
#[no_mangle]
pub extern "C" fn apptel_logging_init() -> c_int {
    match crate::logging::init_from_env() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}
