// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer/consumer event log in shared memory.
//!
//! One application process appends records; a controller process drains
//! them with [`RecordLog::dump`]. Regions entered and exited more than once
//! within one drain interval are coalesced into a [`ShortRegion`] aggregate
//! so that a hot region costs one record per interval instead of two per
//! call.
//!
//! A drain zeroes the shared counts. The producer notices this the next time
//! it takes the lock (`num_record == 0`) and drops the bookkeeping that
//! pointed into the erased tables.

use crate::error::{Error, Result};
use crate::hash::region_hash;
use crate::record::{
    Event, Layout, RawRecord, Record, ShortRegion, LAYOUT_SIZE, MAX_RECORD, MAX_REGION,
};
use crate::time::Timestamp;
use apptel_shm::SharedRegion;
use core::ptr::NonNull;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Producer-side state of one region hash.
#[derive(Clone, Copy, Debug)]
struct RegionState {
    enter_time: Timestamp,
    /// Slot of the ENTRY or SHORT_REGION record for this region, if it is in
    /// the current interval.
    record_idx: Option<usize>,
    /// Slot of the aggregate, once the region has been marked short.
    region_idx: Option<usize>,
    is_short: bool,
}

/// Everything the producer keeps out of shared memory.
#[derive(Debug, Default)]
struct Producer {
    process: Option<i32>,
    time_zero: Option<Timestamp>,
    is_used: bool,
    epoch_count: u64,
    entered: Option<u64>,
    regions: HashMap<u64, RegionState>,
}

/// Setup values, available once both setters have run.
#[derive(Clone, Copy)]
struct Session {
    process: i32,
    time_zero: Timestamp,
}

impl Session {
    fn record(&self, time: &Timestamp, event: Event, signal: u64) -> RawRecord {
        RawRecord::new(self.time_zero.diff(time), self.process, event, signal)
    }
}

pub struct RecordLog {
    shmem: Arc<dyn SharedRegion>,
    layout: NonNull<Layout>,
    producer: Producer,
}

// SAFETY: the layout lives in `shmem`, which is Send + Sync, and is only
// touched while holding its lock.
unsafe impl Send for RecordLog {}
unsafe impl Sync for RecordLog {}

impl RecordLog {
    /// Lays a record log over `shmem` without modifying it.
    ///
    /// A freshly created region is zero filled, which is an empty log. The
    /// consumer and producer each build their own `RecordLog` over their own
    /// mapping of the same region.
    pub fn new(shmem: Arc<dyn SharedRegion>) -> Result<Self> {
        let actual = shmem.size();
        if actual < LAYOUT_SIZE {
            return Err(Error::Undersized {
                actual,
                required: LAYOUT_SIZE,
            });
        }
        let layout = shmem.pointer().cast::<Layout>();
        debug_assert_eq!(
            layout.as_ptr() as usize % core::mem::align_of::<Layout>(),
            0
        );
        Ok(Self {
            shmem,
            layout,
            producer: Producer::default(),
        })
    }

    /// Bytes of shared memory a record log needs.
    pub const fn buffer_size() -> usize {
        LAYOUT_SIZE
    }

    pub const fn max_record() -> usize {
        MAX_RECORD
    }

    pub const fn max_region() -> usize {
        MAX_REGION
    }

    /// Sets the process id stamped on every record.
    pub fn set_process(&mut self, process: i32) -> Result<()> {
        if self.producer.is_used {
            return Err(Error::AlreadyUsed("set_process"));
        }
        self.producer.process = Some(process);
        Ok(())
    }

    /// Sets the origin of record times.
    pub fn set_time_zero(&mut self, time: Timestamp) -> Result<()> {
        if self.producer.is_used {
            return Err(Error::AlreadyUsed("set_time_zero"));
        }
        self.producer.time_zero = Some(time);
        Ok(())
    }

    /// Records entry into region `hash`.
    pub fn enter(&mut self, hash: u64, time: Timestamp) -> Result<()> {
        let session = self.producer.session()?;
        let _lock = self.shmem.scoped_lock();
        // SAFETY: the lock is held for the lifetime of the reference.
        let layout = unsafe { &mut *self.layout.as_ptr() };
        self.producer.enter(layout, &session, hash, time)
    }

    /// Records exit from region `hash`.
    pub fn exit(&mut self, hash: u64, time: Timestamp) -> Result<()> {
        let session = self.producer.session()?;
        let _lock = self.shmem.scoped_lock();
        // SAFETY: see `enter`.
        let layout = unsafe { &mut *self.layout.as_ptr() };
        self.producer.exit(layout, &session, hash, time)
    }

    /// Records an epoch boundary; the record carries the epoch count.
    pub fn epoch(&mut self, time: Timestamp) -> Result<()> {
        self.producer.epoch_count += 1;
        let count = self.producer.epoch_count;
        self.append(time, Event::EpochCount, count).inspect_err(|_| {
            self.producer.epoch_count -= 1;
        })
    }

    /// Records that this process's CPU set changed.
    pub fn cpuset_changed(&mut self, time: Timestamp) -> Result<()> {
        let process = self.producer.session()?.process;
        self.append(time, Event::Affinity, process as u64)
    }

    /// Records that the controller moved this process onto `cpu`.
    pub fn affinity(&mut self, time: Timestamp, cpu: u32) -> Result<()> {
        self.append(time, Event::Affinity, u64::from(cpu))
    }

    pub fn start_profile(&mut self, time: Timestamp, name: &str) -> Result<()> {
        self.append(time, Event::ProfileStart, region_hash(name))
    }

    pub fn stop_profile(&mut self, time: Timestamp, name: &str) -> Result<()> {
        self.append(time, Event::ProfileStop, region_hash(name))
    }

    /// Records `seconds` spent in the profiler itself.
    pub fn overhead(&mut self, time: Timestamp, seconds: f64) -> Result<()> {
        self.append(time, Event::Overhead, seconds.to_bits())
    }

    /// Drains the log.
    ///
    /// `records` and `short_regions` are replaced by everything buffered since
    /// the previous drain, and the shared counts are zeroed. The lock is held
    /// only for the copy.
    pub fn dump(
        &self,
        records: &mut Vec<Record>,
        short_regions: &mut Vec<ShortRegion>,
    ) -> Result<()> {
        records.clear();
        short_regions.clear();
        let raw = {
            let _lock = self.shmem.scoped_lock();
            // SAFETY: see `enter`.
            let layout = unsafe { &mut *self.layout.as_ptr() };
            let num_record = layout.record_count();
            let num_region = layout.region_count();
            layout.num_record = 0;
            layout.num_region = 0;
            let (num_record, num_region) = (num_record?, num_region?);
            short_regions.extend_from_slice(&layout.region_table[..num_region]);
            layout.record_table[..num_record].to_vec()
        };
        trace!(
            records = raw.len(),
            short_regions = short_regions.len(),
            "drained record log"
        );
        records.reserve(raw.len());
        for raw in raw {
            records.push(Record::try_from(raw)?);
        }
        Ok(())
    }

    fn append(&mut self, time: Timestamp, event: Event, signal: u64) -> Result<()> {
        let session = self.producer.session()?;
        let _lock = self.shmem.scoped_lock();
        // SAFETY: see `enter`.
        let layout = unsafe { &mut *self.layout.as_ptr() };
        self.producer.check_reset(layout)?;
        layout.append(session.record(&time, event, signal))?;
        Ok(())
    }
}

impl Producer {
    fn session(&mut self) -> Result<Session> {
        let process = self.process.ok_or(Error::NotConfigured("set_process"))?;
        let time_zero = self
            .time_zero
            .ok_or(Error::NotConfigured("set_time_zero"))?;
        self.is_used = true;
        Ok(Session { process, time_zero })
    }

    /// Forgets slots erased by a drain.
    ///
    /// Only a short region that is still entered survives, with its slots
    /// cleared so the next exit writes a fresh record for it.
    fn check_reset(&mut self, layout: &Layout) -> Result<()> {
        if layout.record_count()? != 0 || self.regions.is_empty() {
            return Ok(());
        }
        let retained = self
            .entered
            .and_then(|hash| self.regions.remove_entry(&hash))
            .filter(|(_, state)| state.is_short);
        self.regions.clear();
        if let Some((hash, mut state)) = retained {
            state.record_idx = None;
            state.region_idx = None;
            self.regions.insert(hash, state);
        }
        trace!(retained = self.regions.len(), "record log was drained");
        Ok(())
    }

    fn enter(
        &mut self,
        layout: &mut Layout,
        session: &Session,
        hash: u64,
        time: Timestamp,
    ) -> Result<()> {
        self.check_reset(layout)?;
        match self.regions.entry(hash) {
            Entry::Occupied(mut entry) => entry.get_mut().enter_time = time,
            Entry::Vacant(entry) => {
                let idx = layout.append(session.record(&time, Event::RegionEntry, hash))?;
                entry.insert(RegionState {
                    enter_time: time,
                    record_idx: Some(idx),
                    region_idx: None,
                    is_short: false,
                });
            }
        }
        self.entered = Some(hash);
        Ok(())
    }

    fn exit(
        &mut self,
        layout: &mut Layout,
        session: &Session,
        hash: u64,
        time: Timestamp,
    ) -> Result<()> {
        self.check_reset(layout)?;
        let Some(state) = self.regions.get_mut(&hash) else {
            layout.append(session.record(&time, Event::RegionExit, hash))?;
            self.entered = None;
            return Ok(());
        };
        state.is_short = true;
        let record_idx = match state.record_idx {
            Some(idx) => idx,
            None => {
                let idx = layout.append(session.record(&time, Event::RegionEntry, hash))?;
                state.record_idx = Some(idx);
                idx
            }
        };
        let region_idx = match state.region_idx {
            Some(idx) => idx,
            None => {
                let idx = layout.push_region(hash)?;
                let record = &mut layout.record_table[record_idx];
                record.event = Event::ShortRegion as i32;
                record.signal = idx as u64;
                state.region_idx = Some(idx);
                idx
            }
        };
        let region = &mut layout.region_table[region_idx];
        region.num_complete += 1;
        region.total_time += state.enter_time.diff(&time);
        self.entered = None;
        Ok(())
    }
}

impl Layout {
    fn record_count(&self) -> Result<usize> {
        checked_count(self.num_record, MAX_RECORD, "record")
    }

    fn region_count(&self) -> Result<usize> {
        checked_count(self.num_region, MAX_REGION, "short region")
    }

    /// Appends `record` and returns its slot.
    fn append(&mut self, record: RawRecord) -> Result<usize> {
        let idx = self.record_count()?;
        if idx >= MAX_RECORD {
            warn!(max = MAX_RECORD, "record log is full");
            return Err(Error::Capacity {
                what: "records",
                max: MAX_RECORD,
            });
        }
        self.record_table[idx] = record;
        self.num_record += 1;
        Ok(idx)
    }

    /// Starts an empty aggregate for `hash` and returns its slot.
    fn push_region(&mut self, hash: u64) -> Result<usize> {
        let idx = self.region_count()?;
        // Every aggregate owns a distinct record, so this cannot exceed
        // MAX_RECORD < MAX_REGION.
        debug_assert!(idx < MAX_REGION);
        let slot = self.region_table.get_mut(idx).ok_or(Error::Capacity {
            what: "short regions",
            max: MAX_REGION,
        })?;
        *slot = ShortRegion {
            hash,
            num_complete: 0,
            total_time: 0.0,
        };
        self.num_region += 1;
        Ok(idx)
    }
}

fn checked_count(count: i32, max: usize, what: &str) -> Result<usize> {
    usize::try_from(count)
        .ok()
        .filter(|&count| count <= max)
        .ok_or_else(|| Error::Corrupt(format!("{what} count {count} outside [0, {max}]")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apptel_shm::{AnonRegion, RawRegion, ScopedLock, HEADER_SIZE};
    use bolero::generator::TypeGenerator;
    use core::sync::atomic::{AtomicUsize, Ordering};

    const PROCESS: i32 = 123;

    fn at(sec: i64) -> Timestamp {
        Timestamp::new(sec, 0)
    }

    fn region() -> Arc<AnonRegion> {
        Arc::new(AnonRegion::new(RecordLog::buffer_size()).unwrap())
    }

    fn ready(shmem: Arc<dyn SharedRegion>) -> RecordLog {
        let mut log = RecordLog::new(shmem).unwrap();
        log.set_process(PROCESS).unwrap();
        log.set_time_zero(at(1)).unwrap();
        log
    }

    fn drain(log: &RecordLog) -> (Vec<Record>, Vec<ShortRegion>) {
        let mut records = Vec::new();
        let mut regions = Vec::new();
        log.dump(&mut records, &mut regions).unwrap();
        (records, regions)
    }

    fn record(time: f64, event: Event, signal: u64) -> Record {
        Record {
            time,
            process: PROCESS,
            event,
            signal,
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(RecordLog::buffer_size(), 49192);
        assert_eq!(RecordLog::max_record(), 1024);
        assert_eq!(RecordLog::max_region(), 1025);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn undersized_region_rejected() {
        let shmem = Arc::new(AnonRegion::new(RecordLog::buffer_size() - 1).unwrap());
        assert!(matches!(
            RecordLog::new(shmem),
            Err(Error::Undersized { actual, required })
                if actual == LAYOUT_SIZE - 1 && required == LAYOUT_SIZE
        ));
    }

    #[test]
    fn every_undersized_region_rejected() {
        let mut buf = vec![0u64; (HEADER_SIZE + LAYOUT_SIZE) / 8 + 1];
        let base = buf.as_mut_ptr() as *mut u8;
        bolero::check!().with_type::<u16>().for_each(|&n| {
            let size = 1 + usize::from(n) % (LAYOUT_SIZE - 1);
            let shmem = unsafe { RawRegion::from_raw_parts(base, HEADER_SIZE + size) }.unwrap();
            assert!(matches!(
                RecordLog::new(Arc::new(shmem)),
                Err(Error::Undersized { .. })
            ));
        });
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn setup_order() {
        let mut log = RecordLog::new(region()).unwrap();
        assert!(matches!(
            log.enter(0x1, at(2)),
            Err(Error::NotConfigured("set_process"))
        ));
        log.set_process(PROCESS).unwrap();
        assert!(matches!(
            log.epoch(at(2)),
            Err(Error::NotConfigured("set_time_zero"))
        ));
        log.set_time_zero(at(1)).unwrap();
        // Failed calls do not freeze the setup.
        log.set_process(PROCESS + 1).unwrap();
        log.set_time_zero(at(0)).unwrap();

        log.epoch(at(2)).unwrap();
        assert!(matches!(
            log.set_process(PROCESS),
            Err(Error::AlreadyUsed("set_process"))
        ));
        assert!(matches!(
            log.set_time_zero(at(1)),
            Err(Error::AlreadyUsed("set_time_zero"))
        ));
        let (records, _) = drain(&log);
        assert_eq!(
            records,
            [Record {
                time: 2.0,
                process: PROCESS + 1,
                event: Event::EpochCount,
                signal: 1,
            }]
        );
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn setters_rejected_after_use() {
        let mut log = ready(region());
        log.epoch(at(2)).unwrap();
        assert!(matches!(
            log.set_process(1),
            Err(Error::AlreadyUsed("set_process"))
        ));
        assert!(matches!(
            log.set_time_zero(at(0)),
            Err(Error::AlreadyUsed("set_time_zero"))
        ));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn one_entry() {
        let mut log = ready(region());
        log.enter(0x1234, at(2)).unwrap();
        let (records, regions) = drain(&log);
        assert_eq!(records, [record(1.0, Event::RegionEntry, 0x1234)]);
        assert!(regions.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn exit_after_drain_is_plain() {
        let mut log = ready(region());
        log.enter(0x1234, at(2)).unwrap();
        let (records, _) = drain(&log);
        assert_eq!(records, [record(1.0, Event::RegionEntry, 0x1234)]);

        log.exit(0x1234, at(3)).unwrap();
        let (records, regions) = drain(&log);
        assert_eq!(records, [record(2.0, Event::RegionExit, 0x1234)]);
        assert!(regions.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn drain_keeps_only_entered_short_region() {
        let mut log = ready(region());
        log.enter(0xA, at(2)).unwrap();
        log.exit(0xA, at(3)).unwrap();
        log.enter(0xB, at(4)).unwrap();
        log.exit(0xB, at(5)).unwrap();
        log.enter(0xB, at(6)).unwrap();
        let (_, regions) = drain(&log);
        assert_eq!(regions.len(), 2);

        // 0xA was forgotten, 0xB restarts its aggregate from the last entry.
        log.exit(0xA, at(7)).unwrap();
        log.exit(0xB, at(8)).unwrap();
        let (records, regions) = drain(&log);
        assert_eq!(
            records,
            [
                record(6.0, Event::RegionExit, 0xA),
                record(7.0, Event::ShortRegion, 0),
            ]
        );
        assert_eq!(
            regions,
            [ShortRegion {
                hash: 0xB,
                num_complete: 1,
                total_time: 2.0,
            }]
        );
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn short_region_entry_exit() {
        let mut log = ready(region());
        let hash = 0x1234;
        log.enter(hash, at(2)).unwrap();
        log.exit(hash, at(3)).unwrap();
        log.enter(hash, at(5)).unwrap();
        log.exit(hash, at(7)).unwrap();

        let (records, regions) = drain(&log);
        assert_eq!(records, [record(1.0, Event::ShortRegion, 0)]);
        assert_eq!(
            regions,
            [ShortRegion {
                hash,
                num_complete: 2,
                total_time: 3.0,
            }]
        );
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn dump_within_region() {
        let mut log = ready(region());
        let hash = 0xabcd;
        log.enter(hash, at(2)).unwrap();
        log.exit(hash, at(3)).unwrap();
        log.enter(hash, at(4)).unwrap();
        log.epoch(at(5)).unwrap();

        let (records, regions) = drain(&log);
        assert_eq!(
            records,
            [
                record(1.0, Event::ShortRegion, 0),
                record(4.0, Event::EpochCount, 1),
            ]
        );
        assert_eq!(
            regions,
            [ShortRegion {
                hash,
                num_complete: 1,
                total_time: 1.0,
            }]
        );

        log.epoch(at(6)).unwrap();
        let (records, regions) = drain(&log);
        assert_eq!(records, [record(5.0, Event::EpochCount, 2)]);
        assert!(regions.is_empty());

        log.epoch(at(7)).unwrap();
        log.exit(hash, at(8)).unwrap();
        let (records, regions) = drain(&log);
        assert_eq!(
            records,
            [
                record(6.0, Event::EpochCount, 3),
                record(7.0, Event::ShortRegion, 0),
            ]
        );
        assert_eq!(
            regions,
            [ShortRegion {
                hash,
                num_complete: 1,
                total_time: 4.0,
            }]
        );
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn unmatched_exit_is_plain() {
        let mut log = ready(region());
        log.exit(0x55, at(2)).unwrap();
        let (records, regions) = drain(&log);
        assert_eq!(records, [record(1.0, Event::RegionExit, 0x55)]);
        assert!(regions.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn events_keep_call_order() {
        let mut log = ready(region());
        log.start_profile(at(2), "app").unwrap();
        log.enter(0x10, at(3)).unwrap();
        log.epoch(at(4)).unwrap();
        log.cpuset_changed(at(5)).unwrap();
        log.affinity(at(5), 3).unwrap();
        log.exit(0x20, at(6)).unwrap();
        log.overhead(at(7), 0.5).unwrap();
        log.stop_profile(at(8), "app").unwrap();

        let (records, _) = drain(&log);
        assert_eq!(
            records,
            [
                record(1.0, Event::ProfileStart, region_hash("app")),
                record(2.0, Event::RegionEntry, 0x10),
                record(3.0, Event::EpochCount, 1),
                record(4.0, Event::Affinity, PROCESS as u64),
                record(4.0, Event::Affinity, 3),
                record(5.0, Event::RegionExit, 0x20),
                record(6.0, Event::Overhead, 0.5f64.to_bits()),
                record(7.0, Event::ProfileStop, region_hash("app")),
            ]
        );
        assert_eq!(records[6].overhead_seconds(), Some(0.5));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn record_table_overflow() {
        let mut log = ready(region());
        for ii in 0..MAX_RECORD as i64 {
            log.epoch(at(ii)).unwrap();
        }
        assert!(matches!(
            log.epoch(at(2000)),
            Err(Error::Capacity { max: MAX_RECORD, .. })
        ));
        assert!(log.enter(0x1, at(2000)).is_err());
        assert!(log.exit(0x1, at(2000)).is_err());

        let (records, _) = drain(&log);
        assert_eq!(records.len(), MAX_RECORD);
        assert_eq!(records.last().map(|r| r.signal), Some(MAX_RECORD as u64));

        log.epoch(at(2001)).unwrap();
        let (records, _) = drain(&log);
        assert_eq!(records, [record(2000.0, Event::EpochCount, 1025)]);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn cannot_overflow_region_table() {
        let mut log = ready(region());
        let hash = 0x1000;
        log.enter(hash, at(2)).unwrap();
        log.exit(hash, at(3)).unwrap();
        drain(&log);

        for ii in 0..MAX_RECORD as u64 {
            log.enter(hash + ii, at(4)).unwrap();
            log.exit(hash + ii, at(5)).unwrap();
        }
        assert!(matches!(
            log.enter(hash + MAX_RECORD as u64, at(6)),
            Err(Error::Capacity { .. })
        ));

        let (records, regions) = drain(&log);
        assert_eq!(records.len(), MAX_RECORD);
        assert_eq!(regions.len(), MAX_RECORD);
        for (ii, (record, region)) in records.iter().zip(&regions).enumerate() {
            assert_eq!(record.event, Event::ShortRegion);
            assert_eq!(record.signal, ii as u64);
            assert_eq!(region.hash, hash + ii as u64);
            assert_eq!(region.num_complete, 1);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn second_dump_is_empty() {
        let mut log = ready(region());
        log.enter(0x1, at(2)).unwrap();
        log.exit(0x1, at(3)).unwrap();
        log.epoch(at(4)).unwrap();
        let (records, regions) = drain(&log);
        assert_eq!(records.len(), 2);
        assert_eq!(regions.len(), 1);
        let (records, regions) = drain(&log);
        assert!(records.is_empty());
        assert!(regions.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn consumer_and_producer_share_one_region() {
        let shmem = region();
        let mut producer = ready(shmem.clone());
        let consumer = RecordLog::new(shmem).unwrap();
        producer.enter(0x7, at(2)).unwrap();
        let (records, _) = drain(&consumer);
        assert_eq!(records, [record(1.0, Event::RegionEntry, 0x7)]);
        let (records, _) = drain(&producer);
        assert!(records.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn corrupt_counts_reported() {
        let shmem = region();
        let mut log = ready(shmem.clone());
        unsafe { shmem.pointer().as_ptr().cast::<i32>().write(MAX_RECORD as i32 + 1) };
        assert!(matches!(log.epoch(at(2)), Err(Error::Corrupt(_))));
        assert!(matches!(
            log.dump(&mut Vec::new(), &mut Vec::new()),
            Err(Error::Corrupt(_))
        ));
        // The drain zeroes the counts even when they were bad.
        log.epoch(at(3)).unwrap();
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn corrupt_event_tag_reported() {
        let shmem = region();
        let mut log = ready(shmem.clone());
        log.epoch(at(2)).unwrap();
        unsafe {
            let layout = shmem.pointer().cast::<Layout>().as_ptr();
            (*layout).record_table[0].event = 42;
        }
        assert!(matches!(
            log.dump(&mut Vec::new(), &mut Vec::new()),
            Err(Error::Corrupt(_))
        ));
    }

    /// Counts lock acquisitions on top of an anonymous region.
    struct CountingRegion {
        inner: AnonRegion,
        locks: AtomicUsize,
    }

    impl SharedRegion for CountingRegion {
        fn size(&self) -> usize {
            self.inner.size()
        }

        fn pointer(&self) -> NonNull<u8> {
            self.inner.pointer()
        }

        fn scoped_lock(&self) -> ScopedLock<'_> {
            self.locks.fetch_add(1, Ordering::Relaxed);
            self.inner.scoped_lock()
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn each_call_takes_the_lock_once() {
        let shmem = Arc::new(CountingRegion {
            inner: AnonRegion::new(LAYOUT_SIZE).unwrap(),
            locks: AtomicUsize::new(0),
        });
        let mut log = RecordLog::new(shmem.clone()).unwrap();
        assert!(log.enter(0x1, at(2)).is_err());
        assert_eq!(shmem.locks.load(Ordering::Relaxed), 0);

        log.set_process(PROCESS).unwrap();
        log.set_time_zero(at(1)).unwrap();
        log.enter(0x1, at(2)).unwrap();
        log.exit(0x1, at(3)).unwrap();
        log.epoch(at(4)).unwrap();
        drain(&log);
        assert_eq!(shmem.locks.load(Ordering::Relaxed), 4);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn epoch_counts_increase() {
        let shmem = region();
        bolero::check!()
            .with_type::<u16>()
            .for_each(|&n| {
                let n = usize::from(n) % (MAX_RECORD + 1);
                let mut log = ready(shmem.clone());
                for ii in 0..n {
                    log.epoch(at(ii as i64)).unwrap();
                }
                let (records, _) = drain(&log);
                let signals: Vec<u64> = records.iter().map(|r| r.signal).collect();
                let expected: Vec<u64> = (1..=n as u64).collect();
                assert_eq!(signals, expected);
            });
    }

    #[derive(Clone, Copy, Debug, TypeGenerator)]
    enum Operation {
        Enter(u8),
        Exit(u8),
        Epoch,
        Overhead,
        Dump,
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn fuzz_operations() {
        let shmem = region();
        bolero::check!()
            .with_type::<Vec<Operation>>()
            .for_each(|ops| {
                let mut log = ready(shmem.clone());
                drain(&log);
                let mut last_epoch = 0;
                let mut buffered = 0usize;
                for (tick, op) in ops.iter().enumerate() {
                    let time = at(2 + tick as i64);
                    let result = match *op {
                        Operation::Enter(h) => log.enter(u64::from(h) + 1, time),
                        Operation::Exit(h) => log.exit(u64::from(h) + 1, time),
                        Operation::Epoch => log.epoch(time),
                        Operation::Overhead => log.overhead(time, 0.001),
                        Operation::Dump => {
                            let (records, regions) = drain(&log);
                            assert!(records.len() <= MAX_RECORD);
                            assert!(regions.len() <= records.len());
                            for record in &records {
                                match record.event {
                                    Event::ShortRegion => {
                                        assert!((record.signal as usize) < regions.len())
                                    }
                                    Event::EpochCount => {
                                        assert!(record.signal > last_epoch);
                                        last_epoch = record.signal;
                                    }
                                    _ => {}
                                }
                            }
                            for region in &regions {
                                assert!(region.num_complete >= 1);
                                assert!(region.total_time >= 0.0);
                            }
                            buffered = 0;
                            Ok(())
                        }
                    };
                    match result {
                        Ok(()) => {}
                        Err(Error::Capacity { .. }) => assert!(buffered >= MAX_RECORD),
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                    if !matches!(op, Operation::Dump) {
                        buffered = (buffered + 1).min(MAX_RECORD);
                    }
                }
            });
    }
}
