// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-CPU live state readable at any time without a lock.
//!
//! Each CPU owns one cache line. A record is written by the thread running
//! on that CPU, or by the controller while nothing runs there, so fields are
//! plain relaxed atomics and neighbours never contend.

use crate::error::{Error, Result};
use crate::hash::{is_valid_hash, HASH_INVALID, HASH_UNMARKED};
use crate::hint::RegionHint;
use apptel_shm::{SharedRegion, CACHE_LINE_SIZE};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

/// Process value of a CPU nobody owns.
pub const PROCESS_UNASSIGNED: i32 = -1;

#[repr(C, align(64))]
struct StatusRecord {
    /// `RegionHint` bits shifted down by 32.
    hints: AtomicU32,
    hash: AtomicU32,
    process: AtomicI32,
    total_work: AtomicU32,
    completed_work: AtomicU32,
}

const RECORD_SIZE: usize = core::mem::size_of::<StatusRecord>();

const _: () = assert!(RECORD_SIZE % CACHE_LINE_SIZE == 0);
const _: () = assert!(core::mem::align_of::<StatusRecord>() == CACHE_LINE_SIZE);

/// One CPU as seen by [`StatusTable::snapshot`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CpuStatus {
    pub hash: u64,
    pub hint: RegionHint,
    pub process: i32,
    /// `None` while no work is tracked.
    pub progress: Option<f64>,
}

pub struct StatusTable {
    // Keeps the mapping behind `records` alive.
    _shmem: Arc<dyn SharedRegion>,
    records: NonNull<StatusRecord>,
    num_cpu: usize,
}

// SAFETY: `records` points into `_shmem`, which is Send + Sync, and every field
// behind it is atomic.
unsafe impl Send for StatusTable {}
unsafe impl Sync for StatusTable {}

impl StatusTable {
    /// Bytes of shared memory needed for `num_cpu` CPUs, or `None` when that
    /// does not fit in `usize`.
    pub const fn buffer_size(num_cpu: usize) -> Option<usize> {
        num_cpu.checked_mul(RECORD_SIZE)
    }

    /// Lays a table over `shmem` and marks every CPU unowned.
    pub fn create(num_cpu: usize, shmem: Arc<dyn SharedRegion>) -> Result<Self> {
        let table = Self::attach(num_cpu, shmem)?;
        for record in table.records() {
            record.total_work.store(0, Ordering::Relaxed);
            record.completed_work.store(0, Ordering::Relaxed);
        }
        let all: Vec<usize> = (0..num_cpu).collect();
        table.set_process(&all, PROCESS_UNASSIGNED)?;
        Ok(table)
    }

    /// Lays a table over a region another process already initialized.
    pub fn attach(num_cpu: usize, shmem: Arc<dyn SharedRegion>) -> Result<Self> {
        let required = Self::buffer_size(num_cpu).ok_or(Error::TooManyCpus(num_cpu))?;
        if shmem.size() != required {
            return Err(Error::StatusSize {
                num_cpu,
                actual: shmem.size(),
                required,
            });
        }
        let base = shmem.pointer();
        let addr = base.as_ptr() as usize;
        if addr % CACHE_LINE_SIZE != 0 {
            return Err(Error::Misaligned {
                addr,
                align: CACHE_LINE_SIZE,
            });
        }
        Ok(Self {
            records: base.cast(),
            _shmem: shmem,
            num_cpu,
        })
    }

    pub fn num_cpu(&self) -> usize {
        self.num_cpu
    }

    fn records(&self) -> &[StatusRecord] {
        // SAFETY: `attach` checked that the region holds exactly `num_cpu`
        // aligned records, every bit pattern is a valid atomic, and `_shmem`
        // keeps the mapping alive for as long as `self` is borrowed.
        unsafe { core::slice::from_raw_parts(self.records.as_ptr(), self.num_cpu) }
    }

    /// Publishes the region now running on `cpu`.
    pub fn set_hash(&self, cpu: usize, hash: u64, hint: RegionHint) -> Result<()> {
        let record = self.record(cpu)?;
        if !is_valid_hash(hash) {
            return Err(Error::InvalidHash(hash));
        }
        record.hash.store(hash as u32, Ordering::Relaxed);
        record.hints.store(hint.to_stored(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get_hash(&self, cpu: usize) -> Result<u64> {
        Ok(u64::from(self.record(cpu)?.hash.load(Ordering::Relaxed)))
    }

    /// Changes the hint without touching the region.
    pub fn set_hint(&self, cpu: usize, hint: RegionHint) -> Result<()> {
        self.record(cpu)?
            .hints
            .store(hint.to_stored(), Ordering::Relaxed);
        Ok(())
    }

    /// Fails if the stored value is not a single known hint.
    pub fn get_hint(&self, cpu: usize) -> Result<RegionHint> {
        RegionHint::from_stored(self.record(cpu)?.hints.load(Ordering::Relaxed))
    }

    /// Starts tracking `units` units of work on `cpu`, none completed.
    pub fn set_total_work_units(&self, cpu: usize, units: u32) -> Result<()> {
        let record = self.record(cpu)?;
        if units == 0 {
            return Err(Error::InvalidWorkUnits(units));
        }
        record.total_work.store(units, Ordering::Relaxed);
        record.completed_work.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Counts one completed unit; ignored while no work is tracked.
    pub fn increment_work_unit(&self, cpu: usize) -> Result<()> {
        let record = self.record(cpu)?;
        if record.total_work.load(Ordering::Relaxed) != 0 {
            record.completed_work.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn reset_work_units(&self, cpu: usize) -> Result<()> {
        let record = self.record(cpu)?;
        record.total_work.store(0, Ordering::Relaxed);
        record.completed_work.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Fraction of tracked work completed, or `None` when nothing is tracked.
    pub fn get_work_progress(&self, cpu: usize) -> Result<Option<f64>> {
        Ok(progress(self.record(cpu)?))
    }

    /// Assigns `cpus` to `process`.
    ///
    /// A negative process marks the CPUs unowned. Every index is checked
    /// before anything is written.
    pub fn set_process(&self, cpus: &[usize], process: i32) -> Result<()> {
        for &cpu in cpus {
            self.record(cpu)?;
        }
        let (hash, hint) = if process < 0 {
            (HASH_INVALID, RegionHint::Inactive)
        } else {
            (HASH_UNMARKED, RegionHint::Unset)
        };
        let records = self.records();
        for &cpu in cpus {
            let record = &records[cpu];
            record.process.store(process, Ordering::Relaxed);
            record.hash.store(hash as u32, Ordering::Relaxed);
            record.hints.store(hint.to_stored(), Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn get_process(&self, cpu: usize) -> Result<i32> {
        Ok(self.record(cpu)?.process.load(Ordering::Relaxed))
    }

    /// Reads every CPU.
    ///
    /// Fields of one CPU are read one at a time, so a record being written
    /// concurrently may mix old and new values.
    pub fn snapshot(&self) -> Result<Vec<CpuStatus>> {
        self.records()
            .iter()
            .map(|record| {
                Ok(CpuStatus {
                    hash: u64::from(record.hash.load(Ordering::Relaxed)),
                    hint: RegionHint::from_stored(record.hints.load(Ordering::Relaxed))?,
                    process: record.process.load(Ordering::Relaxed),
                    progress: progress(record),
                })
            })
            .collect()
    }

    fn record(&self, cpu: usize) -> Result<&StatusRecord> {
        self.records().get(cpu).ok_or(Error::InvalidCpu {
            cpu,
            num_cpu: self.num_cpu,
        })
    }
}

fn progress(record: &StatusRecord) -> Option<f64> {
    let total = record.total_work.load(Ordering::Relaxed);
    let completed = record.completed_work.load(Ordering::Relaxed);
    (total != 0).then(|| f64::from(completed) / f64::from(total))
}
