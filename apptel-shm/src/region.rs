// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::lock::ScopedLock;
use core::ptr::NonNull;
use core::sync::atomic::AtomicU32;

/// Destructive interference size assumed for every shared layout.
pub const CACHE_LINE_SIZE: usize = 64;

/// Bytes reserved in front of the payload for the lock word.
pub const HEADER_SIZE: usize = CACHE_LINE_SIZE;

/// Offset of the lock word within the header.
const LOCK_OFFSET: usize = 0;

/// A block of memory mapped by more than one process.
///
/// `pointer()` and `size()` describe the payload only; the header in front of
/// it is private to the region.
pub trait SharedRegion: Send + Sync {
    /// Payload size in bytes.
    fn size(&self) -> usize;

    /// Start of the payload, aligned to [`CACHE_LINE_SIZE`].
    fn pointer(&self) -> NonNull<u8>;

    /// Takes the cross-process lock for the lifetime of the guard.
    fn scoped_lock(&self) -> ScopedLock<'_>;
}

/// Returns the lock word stored in a region header.
///
/// # Safety
/// `header` must point to at least [`HEADER_SIZE`] bytes that stay mapped for
/// `'a` and are 4-byte aligned.
#[inline]
pub(crate) unsafe fn lock_word<'a>(header: NonNull<u8>) -> &'a AtomicU32 {
    &*(header.as_ptr().add(LOCK_OFFSET) as *const AtomicU32)
}

/// Returns the payload that follows a region header.
///
/// # Safety
/// `header` must point to a mapping longer than [`HEADER_SIZE`].
#[inline]
pub(crate) unsafe fn payload(header: NonNull<u8>) -> NonNull<u8> {
    NonNull::new_unchecked(header.as_ptr().add(HEADER_SIZE))
}
