//! Deferred interrupt delivery.
//!
//! ## Learning: Signals as Flags
//!
//! A signal handler may run between any two instructions, so it must not
//! touch editor state. Here the handler only sets an [`AtomicBool`]; the
//! editor looks at it with [`Interrupts::poll`] at points where stopping is
//! safe. While a [`HoldGuard`] is alive, polls report nothing and the
//! interrupt stays pending until the hold ends.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use signal_hook::SigId;
use signal_hook::consts::SIGINT;

use crate::{BufferError, BufferResult};

/// Pending-interrupt flag plus the hold depth that defers it.
#[derive(Debug, Default)]
pub struct Interrupts {
    pending: Arc<AtomicBool>,
    holds: Arc<AtomicU32>,
    registered: Vec<SigId>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `SIGINT` into the pending flag.
    ///
    /// # Errors
    ///
    /// Returns the error from installing the signal handler.
    pub fn register_sigint(&mut self) -> io::Result<()> {
        let id = signal_hook::flag::register(SIGINT, Arc::clone(&self.pending))?;
        self.registered.push(id);
        tracing::debug!("SIGINT routed to interrupt flag");
        Ok(())
    }

    /// Marks an interrupt as pending, as the signal handler would.
    pub fn raise(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.holds.load(Ordering::SeqCst) > 0
    }

    /// Defers interrupts until the returned guard is dropped. Holds nest.
    ///
    /// The guard shares the hold counter rather than borrowing `self`, so a
    /// hold can span calls that need the owner mutably.
    pub fn hold(&self) -> HoldGuard {
        self.holds.fetch_add(1, Ordering::SeqCst);
        HoldGuard {
            holds: Arc::clone(&self.holds),
        }
    }

    /// Consumes a pending interrupt unless interrupts are held.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Interrupted`] when an interrupt was pending.
    pub fn poll(&self) -> BufferResult<()> {
        if self.is_held() {
            return Ok(());
        }
        if self.pending.swap(false, Ordering::SeqCst) {
            tracing::debug!("interrupt delivered");
            return Err(BufferError::Interrupted);
        }
        Ok(())
    }
}

impl Drop for Interrupts {
    fn drop(&mut self) {
        for id in self.registered.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Scope during which interrupts stay pending.
#[derive(Debug)]
pub struct HoldGuard {
    holds: Arc<AtomicU32>,
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        self.holds.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_consumes_interrupt() {
        let interrupts = Interrupts::new();
        assert!(interrupts.poll().is_ok());

        interrupts.raise();
        assert!(matches!(interrupts.poll(), Err(BufferError::Interrupted)));
        assert!(interrupts.poll().is_ok());
    }

    #[test]
    fn test_hold_defers_interrupt() {
        let interrupts = Interrupts::new();
        {
            let _outer = interrupts.hold();
            let inner = interrupts.hold();
            interrupts.raise();
            assert!(interrupts.poll().is_ok());
            drop(inner);
            assert!(interrupts.poll().is_ok());
            assert!(interrupts.is_pending());
        }
        assert!(!interrupts.is_held());
        assert!(interrupts.poll().is_err());
    }
}
