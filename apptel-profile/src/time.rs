// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use nix::time::{clock_gettime, ClockId};
use std::time::Duration;

const NANOS_PER_SEC: f64 = 1e9;

/// A point on the monotonic clock.
///
/// Only differences between two timestamps are meaningful; the record log
/// stores every event time relative to its time zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: i64,
}

impl Timestamp {
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Reads `CLOCK_MONOTONIC`.
    pub fn now() -> nix::Result<Self> {
        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
        #[allow(clippy::unnecessary_cast)]
        Ok(Self::new(ts.tv_sec() as i64, ts.tv_nsec() as i64))
    }

    /// Seconds from `self` to `later`; negative when `later` is earlier.
    pub fn diff(&self, later: &Timestamp) -> f64 {
        (later.sec - self.sec) as f64 + (later.nsec - self.nsec) as f64 / NANOS_PER_SEC
    }
}

impl From<Duration> for Timestamp {
    fn from(value: Duration) -> Self {
        Self::new(value.as_secs() as i64, i64::from(value.subsec_nanos()))
    }
}
