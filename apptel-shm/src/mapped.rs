// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ShmError;
use crate::lock::ScopedLock;
use crate::region::{self, SharedRegion, HEADER_SIZE};
use core::ffi::c_void;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};
use libc::off_t;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use std::fs::{File, OpenOptions};
use std::io;
use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Pause between attach attempts while waiting for the owner.
const ATTACH_POLL: Duration = Duration::from_millis(1);

/// How a key is resolved to an object on the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyKind {
    /// `/name`: a POSIX shared memory object.
    Posix,
    /// Anything else: a path to a regular file.
    File,
}

impl KeyKind {
    fn of(key: &str) -> Self {
        match key.strip_prefix('/') {
            Some(rest) if !rest.is_empty() && !rest.contains('/') => KeyKind::Posix,
            _ => KeyKind::File,
        }
    }
}

fn open_key(key: &str, create: bool) -> io::Result<OwnedFd> {
    match KeyKind::of(key) {
        KeyKind::Posix => {
            let (flags, mode) = if create {
                (
                    OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL,
                    Mode::S_IRUSR | Mode::S_IWUSR,
                )
            } else {
                (OFlag::O_RDWR, Mode::empty())
            };
            Ok(shm_open(key, flags, mode)?)
        }
        KeyKind::File => {
            let mut options = OpenOptions::new();
            options.read(true).write(true);
            if create {
                options.create_new(true).mode(0o600);
            }
            Ok(options.open(key)?.into())
        }
    }
}

fn unlink_key(key: &str) -> io::Result<()> {
    match KeyKind::of(key) {
        KeyKind::Posix => Ok(shm_unlink(key)?),
        KeyKind::File => std::fs::remove_file(key),
    }
}

fn map_fd(fd: &OwnedFd, len: usize) -> io::Result<NonNull<c_void>> {
    let len = NonZeroUsize::new(len).ok_or(Errno::EINVAL)?;
    // SAFETY: a fresh shared mapping does not alias any Rust object.
    let ptr = unsafe {
        mmap(
            None,
            len,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
            fd,
            0,
        )?
    };
    Ok(ptr)
}

/// A named shared memory region.
///
/// The creating side owns the name and removes it when dropped; attached
/// users only unmap.
pub struct MappedRegion {
    base: NonNull<c_void>,
    map_len: usize,
    key: String,
    is_owner: bool,
    is_linked: AtomicBool,
}

// SAFETY: the mapping is process-shared memory; all mutation through the
// payload is the caller's responsibility and is serialized by the header lock
// or partitioned by ownership.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Creates the named object, sized for `size` payload bytes, and maps it.
    ///
    /// Fails if the key already exists.
    pub fn create(key: impl Into<String>, size: usize) -> Result<Self, ShmError> {
        if size == 0 {
            return Err(ShmError::ZeroSize);
        }
        let key = key.into();
        let map_len = HEADER_SIZE + size;
        let fd = open_key(&key, true).map_err(|source| ShmError::Open {
            key: key.clone(),
            source,
        })?;
        if let Err(err) = ftruncate(&fd, map_len as off_t) {
            _ = unlink_key(&key);
            return Err(ShmError::Resize {
                key,
                size: map_len,
                source: err.into(),
            });
        }
        let base = match map_fd(&fd, map_len) {
            Ok(base) => base,
            Err(source) => {
                _ = unlink_key(&key);
                return Err(ShmError::Map { key, source });
            }
        };
        debug!(key = %key, size, "created shared memory region");
        Ok(Self {
            base,
            map_len,
            key,
            is_owner: true,
            is_linked: AtomicBool::new(true),
        })
    }

    /// Attaches to an existing named object with a single attempt.
    pub fn attach(key: impl Into<String>) -> Result<Self, ShmError> {
        let key = key.into();
        let fd = open_key(&key, false).map_err(|source| ShmError::Open {
            key: key.clone(),
            source,
        })?;
        let len = Self::object_len(&key, &fd)?;
        Self::map_attached(key, fd, len)
    }

    /// Attaches to a named object, waiting up to `timeout` for the owner to
    /// create and size it. A zero timeout is a single attempt.
    pub fn attach_with_timeout(key: impl Into<String>, timeout: Duration) -> Result<Self, ShmError> {
        if timeout.is_zero() {
            return Self::attach(key);
        }
        let key = key.into();
        let begin = Instant::now();
        let fd = loop {
            match open_key(&key, false) {
                Ok(fd) => break fd,
                Err(_) if begin.elapsed() < timeout => std::thread::sleep(ATTACH_POLL),
                Err(_) => return Err(ShmError::Timeout { key, timeout }),
            }
        };
        let len = loop {
            let len = Self::object_len(&key, &fd)?;
            if len != 0 || begin.elapsed() >= timeout {
                break len;
            }
            std::thread::sleep(ATTACH_POLL);
        };
        Self::map_attached(key, fd, len)
    }

    fn object_len(key: &str, fd: &OwnedFd) -> Result<usize, ShmError> {
        let file = File::from(fd.try_clone().map_err(|source| ShmError::Stat {
            key: key.to_owned(),
            source,
        })?);
        let meta = file.metadata().map_err(|source| ShmError::Stat {
            key: key.to_owned(),
            source,
        })?;
        Ok(meta.len() as usize)
    }

    fn map_attached(key: String, fd: OwnedFd, len: usize) -> Result<Self, ShmError> {
        if len <= HEADER_SIZE {
            return Err(ShmError::Undersized {
                key,
                len,
                min: HEADER_SIZE + 1,
            });
        }
        let base = map_fd(&fd, len).map_err(|source| ShmError::Map {
            key: key.clone(),
            source,
        })?;
        debug!(key = %key, size = len - HEADER_SIZE, "attached shared memory region");
        Ok(Self {
            base,
            map_len: len,
            key,
            is_owner: false,
            is_linked: AtomicBool::new(true),
        })
    }

    /// The key this region was created or attached with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Removes the name so no new process can attach. Existing mappings stay
    /// valid.
    ///
    /// Calling it more than once is a no-op. A failure is only reported when
    /// this side attached to the name, i.e. expected someone else to own it.
    pub fn unlink(&self) -> Result<(), ShmError> {
        if !self.is_linked.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        match unlink_key(&self.key) {
            Ok(()) => {
                debug!(key = %self.key, "unlinked shared memory region");
                Ok(())
            }
            Err(_) if self.is_owner => Ok(()),
            Err(source) => Err(ShmError::Unlink {
                key: self.key.clone(),
                source,
            }),
        }
    }

    fn header(&self) -> NonNull<u8> {
        self.base.cast()
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("key", &self.key)
            .field("size", &self.size())
            .field("is_owner", &self.is_owner)
            .finish()
    }
}

impl SharedRegion for MappedRegion {
    fn size(&self) -> usize {
        self.map_len - HEADER_SIZE
    }

    fn pointer(&self) -> NonNull<u8> {
        // SAFETY: map_len > HEADER_SIZE is checked on create and attach.
        unsafe { region::payload(self.header()) }
    }

    fn scoped_lock(&self) -> ScopedLock<'_> {
        // SAFETY: the header is page aligned and mapped while `self` lives.
        ScopedLock::acquire(unsafe { region::lock_word(self.header()) })
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: base/map_len describe the mapping created in map_fd.
        if let Err(err) = unsafe { munmap(self.base, self.map_len) } {
            warn!(key = %self.key, %err, "could not unmap shared memory region");
        }
        if self.is_owner && self.is_linked.swap(false, Ordering::AcqRel) {
            if let Err(err) = unlink_key(&self.key) {
                warn!(key = %self.key, %err, "could not unlink shared memory region");
            }
        }
    }
}
