// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared memory regions for cross-process application telemetry.
//!
//! Every region starts with a 64-byte header holding the lock word used by
//! [`ScopedLock`], followed by the payload that callers lay their fixed-size
//! structures over:
//!
//! ```text
//! +------------------+---------------------------------------------+
//! | Header (64 B)    |                 Payload                     |
//! | lock: AtomicU32  |  SharedRegion::pointer() .. + size()        |
//! +------------------+---------------------------------------------+
//! ```
//!
//! - [`MappedRegion`]: a named object (POSIX shm or regular file) that two unrelated processes
//!   attach to by reconstructing the same key with [`shm_key`].
//! - [`AnonRegion`]: an anonymous `MAP_SHARED` mapping, inherited across `fork`.
//! - [`RawRegion`]: a caller-provided block of memory, used by C callers.
//!
//! The payload is cache-line aligned because the header is exactly one cache
//! line and mappings are page aligned.

mod anon;
pub mod config;
mod error;
mod lock;
mod mapped;
mod raw;
mod region;

pub use anon::AnonRegion;
pub use config::{session_ids, shm_key, ShmConfig};
pub use error::ShmError;
pub use lock::ScopedLock;
pub use mapped::MappedRegion;
pub use raw::RawRegion;
pub use region::{SharedRegion, CACHE_LINE_SIZE, HEADER_SIZE};
