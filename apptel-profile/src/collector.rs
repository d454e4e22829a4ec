// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Controller side of a session: one status table and one record log per
//! client process.

use crate::error::{Error, Result};
use crate::record::{Event, Record, ShortRegion};
use crate::record_log::RecordLog;
use crate::status::StatusTable;
use apptel_shm::{session_ids, MappedRegion, SharedRegion, ShmConfig};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Role of the per-CPU status region in session keys.
pub const STATUS_ROLE: &str = "status";
/// Role of each client's record log region in session keys.
pub const RECORD_LOG_ROLE: &str = "record-log";

/// Creates the named status region for a session owned by `pid`/`uid`.
pub fn create_status_region(
    config: &ShmConfig,
    num_cpu: usize,
    pid: i32,
    uid: u32,
) -> Result<MappedRegion> {
    let size = StatusTable::buffer_size(num_cpu).ok_or(Error::TooManyCpus(num_cpu))?;
    let key = config.key(STATUS_ROLE, pid, uid);
    Ok(MappedRegion::create(key, size)?)
}

/// Creates the named record log region written by client `pid`.
pub fn create_record_log_region(config: &ShmConfig, pid: i32, uid: u32) -> Result<MappedRegion> {
    let key = config.key(RECORD_LOG_ROLE, pid, uid);
    Ok(MappedRegion::create(key, RecordLog::buffer_size())?)
}

pub struct Collector {
    status: StatusTable,
    /// Sorted by process id.
    logs: Vec<(i32, RecordLog)>,
    records: Vec<Record>,
    short_regions: Vec<ShortRegion>,
}

impl Collector {
    /// Attaches to the regions of a running session.
    ///
    /// Keys use this process's effective uid, so the controller must run as
    /// the same user as the session owner.
    pub fn connect(
        config: &ShmConfig,
        num_cpu: usize,
        status_pid: i32,
        client_pids: &[i32],
    ) -> Result<Self> {
        let (_, uid) = session_ids();
        let attach = |role: &str, pid: i32| -> Result<Arc<dyn SharedRegion>> {
            let key = config.key(role, pid, uid);
            let region: Arc<dyn SharedRegion> =
                Arc::new(MappedRegion::attach_with_timeout(key, config.attach_timeout)?);
            Ok(region)
        };
        let status = StatusTable::attach(num_cpu, attach(STATUS_ROLE, status_pid)?)?;
        let logs = client_pids
            .iter()
            .map(|&pid| Ok((pid, RecordLog::new(attach(RECORD_LOG_ROLE, pid)?)?)))
            .collect::<Result<Vec<_>>>()?;
        debug!(status_pid, clients = client_pids.len(), "collector connected");
        Ok(Self::new(status, logs))
    }

    /// Builds a collector over already mapped structures.
    pub fn new(status: StatusTable, mut logs: Vec<(i32, RecordLog)>) -> Self {
        logs.sort_by_key(|(pid, _)| *pid);
        Self {
            status,
            logs,
            records: Vec::new(),
            short_regions: Vec::new(),
        }
    }

    /// Drains every client log.
    ///
    /// Records of all clients are concatenated in ascending process id order.
    /// Short region signals are offset so they index [`Self::short_regions`].
    ///
    /// A client whose log fails to drain contributes nothing; the others are
    /// still collected and the first failure is returned.
    pub fn update(&mut self) -> Result<()> {
        self.records.clear();
        self.short_regions.clear();
        let mut first_err = None;
        let mut records = Vec::new();
        let mut short_regions = Vec::new();
        for (pid, log) in &self.logs {
            if let Err(err) = log.dump(&mut records, &mut short_regions) {
                warn!(pid, %err, "failed to drain client log");
                first_err.get_or_insert(err);
                continue;
            }
            let offset = self.short_regions.len() as u64;
            self.records.extend(records.iter().map(|record| match record.event {
                Event::ShortRegion => Record {
                    signal: record.signal + offset,
                    ..*record
                },
                _ => *record,
            }));
            self.short_regions.extend_from_slice(&short_regions);
            trace!(pid, records = records.len(), "collected client log");
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Records gathered by the last [`Self::update`].
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn short_regions(&self) -> &[ShortRegion] {
        &self.short_regions
    }

    /// Aggregate named by a SHORT_REGION record's signal.
    pub fn short_region(&self, signal: u64) -> Result<ShortRegion> {
        usize::try_from(signal)
            .ok()
            .and_then(|idx| self.short_regions.get(idx))
            .copied()
            .ok_or(Error::UnknownShortRegion {
                index: signal,
                len: self.short_regions.len(),
            })
    }

    pub fn status(&self) -> &StatusTable {
        &self.status
    }

    /// Client process ids in collection order.
    pub fn client_pids(&self) -> impl Iterator<Item = i32> + '_ {
        self.logs.iter().map(|(pid, _)| *pid)
    }
}
