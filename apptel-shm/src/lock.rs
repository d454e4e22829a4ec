// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cross-process scoped lock over a 32-bit word in shared memory.
//!
//! The lock word is a plain `AtomicU32` (0 = unlocked, 1 = locked), so any
//! process mapping the same region can take it without a common mutex type.
//! Critical sections guarded by it are memcpy-sized, so waiters spin briefly
//! and then yield the CPU instead of parking.

use core::sync::atomic::{AtomicU32, Ordering};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// Spins before falling back to `yield_now`.
const SPIN_LIMIT: u32 = 128;

/// Holds the region lock until dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ScopedLock<'a> {
    word: &'a AtomicU32,
}

impl<'a> ScopedLock<'a> {
    /// Blocks until the lock word is acquired.
    pub fn acquire(word: &'a AtomicU32) -> Self {
        let mut spins = 0;
        while word
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            if spins < SPIN_LIMIT {
                spins += 1;
                core::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
        Self { word }
    }

    /// Takes the lock only if it is free right now.
    pub fn try_acquire(word: &'a AtomicU32) -> Option<Self> {
        word.compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { word })
    }
}

impl Drop for ScopedLock<'_> {
    fn drop(&mut self) {
        self.word.store(UNLOCKED, Ordering::Release);
    }
}
