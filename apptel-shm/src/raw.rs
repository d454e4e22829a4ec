// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ShmError;
use crate::lock::ScopedLock;
use crate::region::{self, SharedRegion, HEADER_SIZE};
use core::ptr::NonNull;

/// A region over memory mapped by someone else, e.g. a C caller.
///
/// The block has the same shape as every other region: a [`HEADER_SIZE`]
/// header followed by the payload.
#[derive(Debug)]
pub struct RawRegion {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: see `MappedRegion`; the caller keeps the memory alive.
unsafe impl Send for RawRegion {}
unsafe impl Sync for RawRegion {}

impl RawRegion {
    /// Wraps `len` bytes starting at `base`, header included.
    ///
    /// # Safety
    /// - `base` must point to `len` readable and writable bytes that stay valid for the lifetime of
    ///   the returned value and of every structure built on it.
    /// - Every process sharing the block must agree that its first [`HEADER_SIZE`] bytes are the
    ///   header.
    pub unsafe fn from_raw_parts(base: *mut u8, len: usize) -> Result<Self, ShmError> {
        let base = NonNull::new(base).ok_or(ShmError::InvalidRaw("null pointer"))?;
        if len <= HEADER_SIZE {
            return Err(ShmError::InvalidRaw("block is not larger than the header"));
        }
        if base.as_ptr() as usize % core::mem::align_of::<u64>() != 0 {
            return Err(ShmError::InvalidRaw("block is not 8-byte aligned"));
        }
        Ok(Self { base, len })
    }
}

impl SharedRegion for RawRegion {
    fn size(&self) -> usize {
        self.len - HEADER_SIZE
    }

    fn pointer(&self) -> NonNull<u8> {
        // SAFETY: len > HEADER_SIZE is checked on construction.
        unsafe { region::payload(self.base) }
    }

    fn scoped_lock(&self) -> ScopedLock<'_> {
        // SAFETY: the block is 8-byte aligned and valid per the constructor's
        // contract.
        ScopedLock::acquire(unsafe { region::lock_word(self.base) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_blocks() {
        let mut buf = vec![0u64; 16];
        let ptr = buf.as_mut_ptr() as *mut u8;
        unsafe {
            assert!(RawRegion::from_raw_parts(core::ptr::null_mut(), 128).is_err());
            assert!(RawRegion::from_raw_parts(ptr, HEADER_SIZE).is_err());
            assert!(RawRegion::from_raw_parts(ptr.add(1), 100).is_err());
        }
    }

    #[test]
    fn payload_follows_header() {
        let mut buf = vec![0u64; 16];
        let ptr = buf.as_mut_ptr() as *mut u8;
        let region = unsafe { RawRegion::from_raw_parts(ptr, 128).unwrap() };
        assert_eq!(region.size(), 128 - HEADER_SIZE);
        assert_eq!(region.pointer().as_ptr(), unsafe { ptr.add(HEADER_SIZE) });
        drop(region.scoped_lock());
    }
}
