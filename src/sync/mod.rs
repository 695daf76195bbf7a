//! Synchronization primitives gating the job buffer.
//!
//! The buffer is protected by three primitives:
//!
//! - `mutex`: a binary semaphore guarding the ring indices ([`SemaphoreMutex`])
//! - `empty_slots`: counts free slots, starts at the capacity
//! - `full_slots`: counts queued jobs, starts at zero
//!
//! Each primitive is a [`CountingSemaphore`]. Two backends exist:
//!
//! - [`LocalSemaphore`]: in-process, built on `parking_lot`
//! - [`NamedSemaphore`]: a POSIX named semaphore visible to the whole system
//!   (Linux only). Stale semaphores left by a crashed run are unlinked before
//!   exclusive creation, and every semaphore is closed and unlinked on drop.

mod local;
mod mutex;
#[cfg(target_os = "linux")]
mod named;

pub use local::LocalSemaphore;
pub use mutex::{SemaphoreGuard, SemaphoreMutex};
#[cfg(target_os = "linux")]
pub use named::NamedSemaphore;

use crate::core::{Result, SpoolError};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Default name prefix for named primitives
pub const DEFAULT_NAME_PREFIX: &str = "/print-spool";

/// A blocking resource counter.
///
/// Implementations need not be FIFO-fair.
pub trait CountingSemaphore: Send + Sync + fmt::Debug {
    /// Take one unit, blocking until one is available
    fn acquire(&self) -> Result<()>;

    /// Take one unit if available right now
    fn try_acquire(&self) -> Result<bool>;

    /// Take one unit, waiting at most `timeout`
    ///
    /// Returns `Ok(false)` when the wait expired.
    fn acquire_timeout(&self, timeout: Duration) -> Result<bool>;

    /// Return one unit, waking a waiter if any
    fn release(&self) -> Result<()>;

    /// Current count, when the backend can report it
    fn value(&self) -> Option<usize>;

    /// Name used in logs and errors
    fn name(&self) -> &str;
}

/// Where the primitives live
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PrimitiveBackend {
    /// Anonymous in-process semaphores
    #[default]
    InProcess,
    /// System-wide POSIX named semaphores under `prefix`
    Named {
        /// Name prefix, must start with `/`
        prefix: String,
    },
}

impl PrimitiveBackend {
    /// Named backend with the default prefix
    pub fn named() -> Self {
        PrimitiveBackend::Named {
            prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }

    fn create(&self, role: &str, initial: usize) -> Result<Box<dyn CountingSemaphore>> {
        match self {
            PrimitiveBackend::InProcess => Ok(Box::new(LocalSemaphore::new(role, initial))),
            PrimitiveBackend::Named { prefix } => {
                create_named(&format!("{}-{}", prefix, role), initial)
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn create_named(name: &str, initial: usize) -> Result<Box<dyn CountingSemaphore>> {
    Ok(Box::new(NamedSemaphore::create(name, initial)?))
}

#[cfg(not(target_os = "linux"))]
fn create_named(name: &str, _initial: usize) -> Result<Box<dyn CountingSemaphore>> {
    Err(SpoolError::resource_creation(
        name,
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "named semaphores are only supported on Linux",
        ),
    ))
}

/// The three primitives that gate one buffer
#[derive(Debug)]
pub struct SyncPrimitives {
    /// Binary exclusion lock, initial count 1
    pub mutex: Box<dyn CountingSemaphore>,
    /// Free slots, initial count = capacity
    pub empty_slots: Box<dyn CountingSemaphore>,
    /// Queued jobs, initial count 0
    pub full_slots: Box<dyn CountingSemaphore>,
}

impl SyncPrimitives {
    /// Create fresh primitives for a buffer of `capacity` slots
    ///
    /// If a later primitive fails, the ones already created are dropped,
    /// which releases them.
    pub fn create(backend: &PrimitiveBackend, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SpoolError::invalid_config(
                "capacity",
                "buffer capacity must be at least 1",
            ));
        }
        log::debug!("creating synchronization primitives ({:?})", backend);
        let mutex = backend.create("mutex", 1)?;
        let empty_slots = backend.create("empty", capacity)?;
        let full_slots = backend.create("full", 0)?;
        Ok(Self {
            mutex,
            empty_slots,
            full_slots,
        })
    }

    /// Current values of all three primitives
    pub fn snapshot(&self) -> PrimitiveSnapshot {
        PrimitiveSnapshot {
            mutex: self.mutex.value(),
            empty_slots: self.empty_slots.value(),
            full_slots: self.full_slots.value(),
        }
    }
}

/// Point-in-time values of the primitives, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrimitiveSnapshot {
    /// Exclusion lock count (1 = unlocked)
    pub mutex: Option<usize>,
    /// Free slot count
    pub empty_slots: Option<usize>,
    /// Queued job count
    pub full_slots: Option<usize>,
}

impl fmt::Display for PrimitiveSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(v: Option<usize>) -> String {
            v.map_or_else(|| "?".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "mutex {}; empty {}; full {}",
            show(self.mutex),
            show(self.empty_slots),
            show(self.full_slots)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_process_initial_values() {
        let primitives = SyncPrimitives::create(&PrimitiveBackend::InProcess, 3).unwrap();
        let snapshot = primitives.snapshot();
        assert_eq!(snapshot.mutex, Some(1));
        assert_eq!(snapshot.empty_slots, Some(3));
        assert_eq!(snapshot.full_slots, Some(0));
        assert_eq!(snapshot.to_string(), "mutex 1; empty 3; full 0");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = SyncPrimitives::create(&PrimitiveBackend::InProcess, 0);
        assert!(matches!(
            result,
            Err(SpoolError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_named_default_prefix() {
        assert_eq!(
            PrimitiveBackend::named(),
            PrimitiveBackend::Named {
                prefix: "/print-spool".to_string()
            }
        );
        assert_eq!(PrimitiveBackend::default(), PrimitiveBackend::InProcess);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_named_primitives_created_and_released() {
        let prefix = format!("/print-spool-test-{}-create", std::process::id());
        let backend = PrimitiveBackend::Named {
            prefix: prefix.clone(),
        };

        let primitives = SyncPrimitives::create(&backend, 2).unwrap();
        assert_eq!(primitives.snapshot().empty_slots, Some(2));
        drop(primitives);

        // Released names can be created again exclusively.
        let again = SyncPrimitives::create(&backend, 4).unwrap();
        assert_eq!(again.snapshot().empty_slots, Some(4));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_partial_creation_released() {
        use std::ffi::CString;

        let prefix = format!("/print-spool-test-{}-partial", std::process::id());
        let backend = PrimitiveBackend::Named {
            prefix: prefix.clone(),
        };

        // The mutex is created, then the empty-slot count is out of range
        match SyncPrimitives::create(&backend, usize::MAX) {
            Err(SpoolError::ResourceCreation { resource, .. }) => {
                assert_eq!(resource, format!("{}-empty", prefix));
            }
            other => panic!("expected ResourceCreation, got {:?}", other),
        }

        let mutex_name = CString::new(format!("{}-mutex", prefix)).unwrap();
        // Safety: mutex_name is a valid NUL-terminated string; no O_CREAT.
        let sem = unsafe { libc::sem_open(mutex_name.as_ptr(), 0) };
        let err = std::io::Error::last_os_error();
        if sem != libc::SEM_FAILED {
            // Safety: sem was just opened.
            unsafe {
                libc::sem_close(sem);
                libc::sem_unlink(mutex_name.as_ptr());
            }
            panic!("partially created mutex was left behind");
        }
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
