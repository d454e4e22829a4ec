// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("cannot create a shared memory region of zero size")]
    ZeroSize,

    #[error("could not open shared memory with key \"{key}\"")]
    Open {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("could not extend shared memory \"{key}\" to {size} bytes")]
    Resize {
        key: String,
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("could not map shared memory region \"{key}\"")]
    Map {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("could not stat shared memory \"{key}\"")]
    Stat {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {timeout:?} waiting for shared memory \"{key}\"")]
    Timeout {
        key: String,
        timeout: std::time::Duration,
    },

    #[error("shared memory \"{key}\" is {len} bytes, smaller than its {min} byte header")]
    Undersized { key: String, len: usize, min: usize },

    #[error("could not unlink shared memory \"{key}\"")]
    Unlink {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid raw region: {0}")]
    InvalidRaw(&'static str),
}
