//! Cooperative cancellation driven by SIGINT/SIGTERM.
//!
//! The installed handler only stores `true` into an atomic flag. All stop
//! handling happens on the normal control path, wherever a [`CancelToken`]
//! is polled: before each blocking wait and after a wait returns `EINTR`.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

static TERMINATION_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_termination(_signal: libc::c_int) {
    TERMINATION_REQUESTED.store(true, Ordering::SeqCst);
}

#[derive(Debug, Clone)]
enum Flag {
    /// The process-wide flag written by the signal handler.
    Signal(&'static AtomicBool),
    Detached(Arc<AtomicBool>),
}

/// A shared "stop now" flag checked at defined poll points.
///
/// Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Flag,
}

impl CancelToken {
    /// A token not connected to any signal, cancelled only via [`cancel`].
    ///
    /// [`cancel`]: CancelToken::cancel
    pub fn new() -> Self {
        Self {
            flag: Flag::Detached(Arc::new(AtomicBool::new(false))),
        }
    }

    fn flag(&self) -> &AtomicBool {
        match &self.flag {
            Flag::Signal(flag) => *flag,
            Flag::Detached(flag) => flag.as_ref(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag().load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.flag().store(true, Ordering::SeqCst);
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Install SIGINT and SIGTERM handlers and return the token they trip.
///
/// `SA_RESTART` stays unset: a blocked `sem_wait` must return `EINTR` so
/// the caller reaches its poll point.
pub fn install_termination_handlers() -> Result<CancelToken> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: sigaction is zero-initialisable; the handler is an
        // async-signal-safe atomic store.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = on_termination as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = 0;
            libc::sigemptyset(&mut action.sa_mask);
            if libc::sigaction(signal, &action, std::ptr::null_mut()) == -1 {
                return Err(Error::last_os("sigaction"));
            }
        }
    }
    Ok(CancelToken {
        flag: Flag::Signal(&TERMINATION_REQUESTED),
    })
}
