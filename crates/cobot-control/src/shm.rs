//! A tmpfs-backed shared memory region.
//!
//! Linux only: the Servo Driver and the "main" process both run on the
//! same controller host, so there is no cross-platform IPC story to
//! carry (`SPEC_FULL.md` §5). Grounded on
//! `water236-horus/horus_core/src/memory/shm_region.rs`'s Linux branch:
//! a file under `/dev/shm` mapped with `memmap2`.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;

use memmap2::MmapMut;

/// A fixed-size region of shared memory backed by a file in `/dev/shm`.
/// The first process to open a given name creates and zero-fills it; any
/// process that opens the same name afterward maps the same bytes.
pub struct ShmRegion {
    mmap: MmapMut,
    path: PathBuf,
    _file: File,
    owner: bool,
}

impl ShmRegion {
    /// Opens (creating if necessary) a region of exactly `size` bytes
    /// named `cobot_<name>` under `/dev/shm`.
    pub fn open(name: &str, size: usize) -> io::Result<Self> {
        let path = PathBuf::from("/dev/shm").join(format!("cobot_{name}"));
        let existed = path.exists();

        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        let owner = !existed;
        if owner {
            file.set_len(size as u64)?;
        } else if file.metadata()?.len() < size as u64 {
            file.set_len(size as u64)?;
        }

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        if owner {
            mmap.fill(0);
        }

        Ok(Self { mmap, path, _file: file, owner })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        if self.owner {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_the_same_name_twice_maps_the_same_bytes() {
        let name = format!("test_{}", std::process::id());
        let mut a = ShmRegion::open(&name, 4096).unwrap();
        assert!(a.is_owner());
        unsafe {
            *a.as_mut_ptr() = 0xAB;
        }
        let b = ShmRegion::open(&name, 4096).unwrap();
        assert!(!b.is_owner());
        unsafe {
            assert_eq!(*b.as_ptr(), 0xAB);
        }
    }
}
