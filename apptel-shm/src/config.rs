// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Session key derivation and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_SHM_PREFIX: &str = "APPTEL_SHM_PREFIX";
pub const ENV_SHM_DIR: &str = "APPTEL_SHM_DIR";
pub const ENV_ATTACH_TIMEOUT: &str = "APPTEL_ATTACH_TIMEOUT";

pub const DEFAULT_SHM_PREFIX: &str = "apptel";

pub mod parse_env {
    use std::{env, path::PathBuf, time::Duration};

    pub fn duration(name: &str) -> Option<Duration> {
        parse::duration(&env::var(name).ok()?)
    }

    pub fn str_not_empty(name: &str) -> Option<String> {
        env::var(name).ok().filter(|s| !s.is_empty())
    }

    pub fn path(name: &str) -> Option<PathBuf> {
        str_not_empty(name).map(PathBuf::from)
    }

    pub(crate) mod parse {
        use std::time::Duration;

        pub fn duration(value: &str) -> Option<Duration> {
            Duration::try_from_secs_f64(value.trim().parse::<f64>().ok()?).ok()
        }
    }
}

/// Where and how session regions are named.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShmConfig {
    /// Leading component of every key.
    pub prefix: String,
    /// When set, keys are regular files in this directory instead of POSIX
    /// shared memory names.
    pub shm_dir: Option<PathBuf>,
    /// How long an attaching process waits for the owner; zero means a single
    /// attempt.
    pub attach_timeout: Duration,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_SHM_PREFIX.to_owned(),
            shm_dir: None,
            attach_timeout: Duration::ZERO,
        }
    }
}

impl ShmConfig {
    pub fn from_env() -> Self {
        Self {
            prefix: parse_env::str_not_empty(ENV_SHM_PREFIX)
                .unwrap_or_else(|| DEFAULT_SHM_PREFIX.to_owned()),
            shm_dir: parse_env::path(ENV_SHM_DIR),
            attach_timeout: parse_env::duration(ENV_ATTACH_TIMEOUT).unwrap_or(Duration::ZERO),
        }
    }

    /// See [`shm_key`].
    pub fn key(&self, role: &str, pid: i32, uid: u32) -> String {
        shm_key(self, role, pid, uid)
    }
}

/// Builds the key for one session region.
///
/// The result depends only on the configuration and the three inputs, so a
/// producer and a collector that agree on the configuration agree on the key.
pub fn shm_key(config: &ShmConfig, role: &str, pid: i32, uid: u32) -> String {
    let name = format!("{}-{role}-{pid}-{uid}", config.prefix);
    match &config.shm_dir {
        Some(dir) => dir.join(name).to_string_lossy().into_owned(),
        None => format!("/{name}"),
    }
}

/// Process id and effective user id of the caller.
pub fn session_ids() -> (i32, u32) {
    (
        nix::unistd::getpid().as_raw(),
        nix::unistd::geteuid().as_raw(),
    )
}
