// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cross-process application telemetry over shared memory.
//!
//! An instrumented application writes region transitions into a
//! [`RecordLog`] and live per-CPU state into a [`StatusTable`]; a controller
//! process maps the same regions and reads them through a [`Collector`].
//! Both structures have a fixed layout that is part of the ABI between the
//! two processes.

pub mod collector;
mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod hash;
mod hint;
pub mod logging;
mod record;
mod record_log;
mod status;
mod time;

pub use collector::{
    create_record_log_region, create_status_region, Collector, RECORD_LOG_ROLE, STATUS_ROLE,
};
pub use error::{Error, Result};
pub use hash::{region_hash, HASH_APP, HASH_EPOCH, HASH_INVALID, HASH_UNMARKED};
pub use hint::{RegionHint, HINT_MASK};
pub use record::{Event, Record, ShortRegion, LAYOUT_SIZE, MAX_RECORD, MAX_REGION};
pub use record_log::RecordLog;
pub use status::{CpuStatus, StatusTable, PROCESS_UNASSIGNED};
pub use time::Timestamp;
