// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use apptel_shm::ShmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("shared memory provided is too small: {actual} bytes, record log needs {required}")]
    Undersized { actual: usize, required: usize },

    #[error("shared memory incorrectly sized: {actual} bytes, status table for {num_cpu} CPUs needs {required}")]
    StatusSize {
        num_cpu: usize,
        actual: usize,
        required: usize,
    },

    #[error("status table for {0} CPUs does not fit in the address space")]
    TooManyCpus(usize),

    #[error("shared memory at {addr:#x} is not aligned to {align} bytes")]
    Misaligned { addr: usize, align: usize },

    #[error("maximum number of {what} reached ({max})")]
    Capacity { what: &'static str, max: usize },

    #[error("{0}() must be called prior to calling enter(), exit() or epoch()")]
    NotConfigured(&'static str),

    #[error("{0}() called after the record log has been used")]
    AlreadyUsed(&'static str),

    #[error("invalid CPU index {cpu}, table has {num_cpu} CPUs")]
    InvalidCpu { cpu: usize, num_cpu: usize },

    #[error("invalid region hash {0:#x}: more than 32 significant bits")]
    InvalidHash(u64),

    #[error("invalid hint {0:#x}")]
    InvalidHint(u64),

    #[error("invalid number of work units: {0}")]
    InvalidWorkUnits(u32),

    #[error("corrupt shared memory: {0}")]
    Corrupt(String),

    #[error("short region index {index} out of range ({len} collected)")]
    UnknownShortRegion { index: u64, len: usize },

    #[error(transparent)]
    Shm(#[from] ShmError),
}
