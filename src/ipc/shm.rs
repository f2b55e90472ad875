//! Named POSIX shared memory objects mapped read-write.

use crate::error::{Error, Result};
use std::ffi::CString;
use std::io;
use std::ptr;

/// A mapped shared memory object. Unmapped and closed on drop; the name is
/// only removed by an explicit [`SharedMemory::unlink`].
#[derive(Debug)]
pub struct SharedMemory {
    fd: libc::c_int,
    ptr: *mut libc::c_void,
    len: usize,
    name: String,
}

// SAFETY: the mapping is plain memory shared with other processes anyway;
// all access to its contents is synchronized by the channel protocol.
unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

fn c_name(name: &str, op: &'static str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::Ipc {
        op,
        source: io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL"),
    })
}

impl SharedMemory {
    /// Create a new zero-filled object of `len` bytes and map it.
    ///
    /// Fails if the name already exists. On a later failure the object is
    /// unlinked again before returning.
    pub fn create(name: &str, len: usize) -> Result<Self> {
        let c = c_name(name, "shm_open (create)")?;
        // SAFETY: valid NUL-terminated name.
        let fd = unsafe {
            libc::shm_open(
                c.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd == -1 {
            return Err(Error::last_os("shm_open (create)"));
        }

        // SAFETY: fd is a freshly opened shm descriptor.
        if unsafe { libc::ftruncate(fd, len as libc::off_t) } == -1 {
            let err = Error::last_os("ftruncate");
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c.as_ptr());
            }
            return Err(err);
        }

        match Self::map(fd, len, name) {
            Ok(shm) => Ok(shm),
            Err(err) => {
                // SAFETY: map closed fd on failure; only the name remains.
                unsafe { libc::shm_unlink(c.as_ptr()) };
                Err(err)
            }
        }
    }

    /// Open an existing object and map its full current size.
    pub fn open(name: &str) -> Result<Self> {
        let c = c_name(name, "shm_open")?;
        // SAFETY: valid NUL-terminated name.
        let fd = unsafe { libc::shm_open(c.as_ptr(), libc::O_RDWR, 0) };
        if fd == -1 {
            return Err(Error::last_os("shm_open"));
        }

        // SAFETY: zeroed stat is a valid out-parameter.
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } == -1 {
            let err = Error::last_os("fstat");
            unsafe { libc::close(fd) };
            return Err(err);
        }
        let len = stat.st_size as usize;
        if len == 0 {
            unsafe { libc::close(fd) };
            return Err(Error::NotInitialized {
                name: name.to_string(),
            });
        }

        Self::map(fd, len, name)
    }

    /// Map `fd`. Takes ownership of `fd`, closing it on failure.
    fn map(fd: libc::c_int, len: usize, name: &str) -> Result<Self> {
        // SAFETY: fd refers to an object of at least len bytes.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = Error::last_os("mmap");
            unsafe { libc::close(fd) };
            return Err(err);
        }
        Ok(Self {
            fd,
            ptr,
            len,
            name: name.to_string(),
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr as *mut u8
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove `name` from the system. Existing mappings stay valid.
    pub fn unlink(name: &str) -> Result<()> {
        let c = c_name(name, "shm_unlink")?;
        // SAFETY: valid NUL-terminated name.
        if unsafe { libc::shm_unlink(c.as_ptr()) } == -1 {
            return Err(Error::last_os("shm_unlink"));
        }
        Ok(())
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        // SAFETY: ptr/len came from a successful mmap, fd from shm_open;
        // both are released exactly once here.
        unsafe {
            if libc::munmap(self.ptr, self.len) == -1 {
                tracing::warn!(name = %self.name, error = %io::Error::last_os_error(), "munmap failed");
            }
            if libc::close(self.fd) == -1 {
                tracing::warn!(name = %self.name, error = %io::Error::last_os_error(), "close failed");
            }
        }
    }
}
