// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ShmError;
use crate::lock::ScopedLock;
use crate::region::{self, SharedRegion, HEADER_SIZE};
use core::ffi::c_void;
use core::ptr::NonNull;
use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use std::num::NonZeroUsize;
use tracing::warn;

/// An anonymous `MAP_SHARED` region.
///
/// It has no name, so only the creating process and children forked after
/// creation see it.
#[derive(Debug)]
pub struct AnonRegion {
    base: NonNull<c_void>,
    map_len: usize,
}

// SAFETY: see `MappedRegion`.
unsafe impl Send for AnonRegion {}
unsafe impl Sync for AnonRegion {}

impl AnonRegion {
    /// Maps a zero-filled region with `size` payload bytes.
    pub fn new(size: usize) -> Result<Self, ShmError> {
        if size == 0 {
            return Err(ShmError::ZeroSize);
        }
        let map_len = HEADER_SIZE + size;
        let len = NonZeroUsize::new(map_len).ok_or(ShmError::ZeroSize)?;
        // SAFETY: a fresh anonymous mapping does not alias any Rust object.
        let base = unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
        }
        .map_err(|err| ShmError::Map {
            key: String::from("<anonymous>"),
            source: err.into(),
        })?;
        Ok(Self { base, map_len })
    }
}

impl SharedRegion for AnonRegion {
    fn size(&self) -> usize {
        self.map_len - HEADER_SIZE
    }

    fn pointer(&self) -> NonNull<u8> {
        // SAFETY: map_len > HEADER_SIZE since size != 0.
        unsafe { region::payload(self.base.cast()) }
    }

    fn scoped_lock(&self) -> ScopedLock<'_> {
        // SAFETY: the header is page aligned and mapped while `self` lives.
        ScopedLock::acquire(unsafe { region::lock_word(self.base.cast()) })
    }
}

impl Drop for AnonRegion {
    fn drop(&mut self) {
        // SAFETY: base/map_len describe the mapping created in `new`.
        if let Err(err) = unsafe { munmap(self.base, self.map_len) } {
            warn!(%err, "could not unmap anonymous region");
        }
    }
}
