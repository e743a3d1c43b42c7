//! Cooperative shutdown signal
//!
//! The engine never times out on its own. An external resource-limit checker
//! (or a sibling worker) requests shutdown; the engine polls the flag at every
//! waitlist pop and around every nested-analysis descent.

use crate::errors::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag with a reason
#[derive(Debug, Clone, Default)]
pub struct ShutdownNotifier {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl ShutdownNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; the first reason wins
    pub fn request_shutdown(&self, reason: impl Into<String>) {
        let mut slot = self.reason.lock();
        if slot.is_none() {
            *slot = Some(reason.into());
        }
        self.flag.store(true, Ordering::Release);
    }

    pub fn should_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Fail with [`EngineError::Cancelled`] if shutdown was requested
    pub fn check(&self) -> EngineResult<()> {
        if self.should_shutdown() {
            return Err(EngineError::Cancelled {
                reason: self.reason().unwrap_or_else(|| "shutdown requested".to_string()),
            });
        }
        Ok(())
    }
}
