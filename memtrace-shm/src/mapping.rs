// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::key::ShmKey;
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, msync, munmap, shm_open, shm_unlink, MapFlags, MsFlags, ProtFlags};
use nix::sys::stat::Mode;
use std::ffi::c_void;
use std::fs::File;
use std::io;
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// An owned, mapped shared memory region.
///
/// The mapping is released when the value is dropped, if and only if it is mapped. A mapping
/// created with a zero length, or left behind by [`ShmMapping::take`], is inert: its address is
/// null and dropping it does nothing.
#[derive(Default)]
pub struct ShmMapping {
    ptr: Option<NonNull<c_void>>,
    // usable bytes, as requested by the caller
    len: usize,
    // bytes actually mapped, page aligned
    mapped_len: usize,
    handle: Option<File>,
}

fn page_aligned_size(size: usize) -> usize {
    let page_size = page_size::get();
    // round up to nearest page
    ((size - 1) & !(page_size - 1)) + page_size
}

#[cfg(target_os = "linux")]
fn open_anon_shm() -> io::Result<File> {
    let memfd = memfd::MemfdOptions::default()
        .create("memtrace-anon-shm")
        .map_err(io::Error::other)?;
    Ok(memfd.into_file())
}

#[cfg(not(target_os = "linux"))]
fn open_anon_shm() -> io::Result<File> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static NEXT_ANON: AtomicU32 = AtomicU32::new(0);

    let path = format!(
        "/memtrace-anon-{}-{}",
        std::process::id(),
        NEXT_ANON.fetch_add(1, Ordering::Relaxed)
    );
    let fd = shm_open(path.as_str(), OFlag::O_CREAT | OFlag::O_RDWR, Mode::empty());
    _ = shm_unlink(path.as_str());
    Ok(File::from(fd?))
}

impl ShmMapping {
    /// Maps a fresh anonymous region of `length` bytes.
    ///
    /// A zero length yields an inert mapping with a null address.
    pub fn allocate(length: usize) -> io::Result<ShmMapping> {
        if length == 0 {
            return Ok(ShmMapping::default());
        }
        let mapping = Self::map_file(open_anon_shm()?, length)?;
        debug!(
            len = length,
            ptr = ?mapping.as_ptr(),
            "allocated anonymous shared memory"
        );
        Ok(mapping)
    }

    /// Maps the region named by `key`, creating it if needed.
    ///
    /// An existing region is grown to `length` bytes but never shrunk, so the same key and the
    /// same length always map the same memory.
    pub fn open_or_create(key: &ShmKey, length: usize) -> io::Result<ShmMapping> {
        if length == 0 {
            return Ok(ShmMapping::default());
        }
        let fd = shm_open(
            key.name(),
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IWGRP,
        )?;
        let mapping = Self::map_file(File::from(fd), length)?;
        debug!(key = %key, len = length, "mapped keyed shared memory");
        Ok(mapping)
    }

    /// Attaches to an existing region named by `key`, mapping all of it.
    pub fn open(key: &ShmKey) -> io::Result<ShmMapping> {
        let fd = shm_open(key.name(), OFlag::O_RDWR, Mode::empty())?;
        let file = File::from(fd);
        let length = usize::try_from(file.metadata()?.len()).map_err(io::Error::other)?;
        if length == 0 {
            return Ok(ShmMapping::default());
        }
        Self::map_file(file, length)
    }

    /// Removes the name of a keyed region. Existing mappings stay valid.
    pub fn unlink(key: &ShmKey) -> io::Result<()> {
        shm_unlink(key.name())?;
        Ok(())
    }

    fn map_file(file: File, length: usize) -> io::Result<ShmMapping> {
        let mapped_len = page_aligned_size(length);
        if file.metadata()?.len() < mapped_len as u64 {
            file.set_len(mapped_len as u64)?;
        }
        let size = NonZeroUsize::new(mapped_len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty mapping"))?;
        // SAFETY: the file was sized above and stays open for the lifetime of the mapping.
        let ptr = unsafe {
            mmap(
                None,
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )?
        };
        Ok(ShmMapping {
            ptr: Some(ptr),
            len: length,
            mapped_len,
            handle: Some(file),
        })
    }

    /// Moves the region out, leaving `self` inert.
    pub fn take(&mut self) -> ShmMapping {
        std::mem::take(self)
    }

    /// Base address of the region, null when inert.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
            .map_or(std::ptr::null_mut(), |ptr| ptr.as_ptr().cast())
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Usable length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.ptr {
            // SAFETY: ptr maps at least `len` bytes for as long as self is alive.
            Some(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr().cast(), self.len) },
            None => &[],
        }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self.ptr {
            // SAFETY: see as_slice; &mut self guarantees no other slice from this mapping.
            Some(ptr) => unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr().cast(), self.len)
            },
            None => &mut [],
        }
    }

    /// Writes the region back to its backing object and waits for completion.
    pub fn sync(&self) -> io::Result<()> {
        if let Some(ptr) = self.ptr {
            // SAFETY: ptr and mapped_len describe a live mapping owned by self.
            unsafe { msync(ptr, self.mapped_len, MsFlags::MS_SYNC)? };
        }
        Ok(())
    }

    /// The file handle backing the region, if mapped.
    pub fn handle(&self) -> Option<&File> {
        self.handle.as_ref()
    }
}

impl Drop for ShmMapping {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: ptr and mapped_len come from a successful mmap that only self owns.
            if let Err(e) = unsafe { munmap(ptr, self.mapped_len) } {
                warn!("failed to unmap shared memory: {e}");
            }
        }
    }
}

// SAFETY: the mapping is process-wide memory; access through &self is read-only and writes need
// &mut self.
unsafe impl Send for ShmMapping {}
unsafe impl Sync for ShmMapping {}
