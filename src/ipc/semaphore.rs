//! Named POSIX counting semaphores.

use crate::error::{Error, Result};
use std::ffi::CString;
use std::io;

/// Result of a blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// A token was taken.
    Acquired,
    /// A signal handler ran before a token became available.
    Interrupted,
}

/// An open handle on a named semaphore. Closed on drop; never unlinked
/// implicitly.
#[derive(Debug)]
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: CString,
}

// SAFETY: sem_wait/sem_post/sem_getvalue are thread-safe on a valid handle,
// and the handle stays valid until drop.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::Ipc {
        op: "sem_open",
        source: io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL"),
    })
}

impl NamedSemaphore {
    /// Create a new semaphore; fails if the name already exists.
    pub fn create(name: &str, initial: u32) -> Result<Self> {
        let c = c_name(name)?;
        // SAFETY: valid NUL-terminated name; variadic mode and value follow
        // the O_CREAT calling convention.
        let sem = unsafe {
            libc::sem_open(
                c.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(Error::last_os("sem_open (create)"));
        }
        Ok(Self { sem, name: c })
    }

    /// Open an existing semaphore.
    pub fn open(name: &str) -> Result<Self> {
        let c = c_name(name)?;
        // SAFETY: valid NUL-terminated name.
        let sem = unsafe { libc::sem_open(c.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(Error::last_os("sem_open"));
        }
        Ok(Self { sem, name: c })
    }

    /// Block until a token is available or a signal interrupts the wait.
    pub fn wait(&self) -> Result<Wait> {
        // SAFETY: handle is open for the lifetime of self.
        if unsafe { libc::sem_wait(self.sem) } == 0 {
            return Ok(Wait::Acquired);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            Ok(Wait::Interrupted)
        } else {
            Err(Error::Ipc {
                op: "sem_wait",
                source: err,
            })
        }
    }

    /// Return one token.
    pub fn post(&self) -> Result<()> {
        // SAFETY: handle is open for the lifetime of self.
        if unsafe { libc::sem_post(self.sem) } == -1 {
            return Err(Error::last_os("sem_post"));
        }
        Ok(())
    }

    /// Current token count.
    pub fn value(&self) -> Result<u32> {
        let mut value: libc::c_int = 0;
        // SAFETY: handle is open; value is a valid out-pointer.
        if unsafe { libc::sem_getvalue(self.sem, &mut value) } == -1 {
            return Err(Error::last_os("sem_getvalue"));
        }
        Ok(value.max(0) as u32)
    }

    pub fn name(&self) -> &str {
        self.name.to_str().unwrap_or_default()
    }

    /// Remove `name` from the system. Open handles stay usable.
    pub fn unlink(name: &str) -> Result<()> {
        let c = c_name(name)?;
        // SAFETY: valid NUL-terminated name.
        if unsafe { libc::sem_unlink(c.as_ptr()) } == -1 {
            return Err(Error::last_os("sem_unlink"));
        }
        Ok(())
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: handle was returned by sem_open and is closed exactly once.
        if unsafe { libc::sem_close(self.sem) } == -1 {
            tracing::warn!(
                name = self.name(),
                error = %io::Error::last_os_error(),
                "sem_close failed"
            );
        }
    }
}
