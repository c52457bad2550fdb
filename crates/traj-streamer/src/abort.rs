// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Asynchronous shutdown trigger.
//!
//! The [`AbortController`] is the only state shared between the serving
//! thread and the outside world. Triggering it does exactly two things:
//!
//! 1. flips the shutdown flag (false -> true, once), and
//! 2. runs the armed [`Unblocker`] so an in-progress blocking transport call
//!    on the active connection returns.
//!
//! Blocking waits inside the engine (accept polling, readiness waits, the
//! post-session debounce) are sliced so they observe the flag promptly.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Slice length for interruptible sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Force-unblocks reads on the active connection (e.g. TCP `shutdown(Read)`).
pub type Unblocker = Box<dyn Fn() + Send + Sync>;

/// Shared shutdown flag plus the active-connection unblock slot.
#[derive(Default)]
pub struct AbortController {
    triggered: AtomicBool,
    active: Mutex<Option<Unblocker>>,
}

impl std::fmt::Debug for AbortController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortController")
            .field("triggered", &self.is_triggered())
            .field("armed", &self.active.lock().is_some())
            .finish()
    }
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` for the call that made the transition.
    pub fn trigger(&self) -> bool {
        let first = !self.triggered.swap(true, Ordering::SeqCst);
        if let Some(unblock) = self.active.lock().as_ref() {
            unblock();
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Register the unblocker for the connection being served.
    ///
    /// If shutdown already fired, the unblocker runs immediately.
    pub fn arm(&self, unblocker: Unblocker) {
        let mut slot = self.active.lock();
        if self.is_triggered() {
            unblocker();
        }
        *slot = Some(unblocker);
    }

    /// Clear the unblock slot once the connection is gone.
    pub fn disarm(&self) {
        self.active.lock().take();
    }

    /// Sleep for `duration` unless shutdown fires first.
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Route SIGINT/SIGTERM to [`trigger`](Self::trigger).
    pub fn install_signal_handler(self: &Arc<Self>) -> Result<(), ctrlc::Error> {
        let abort = Arc::clone(self);
        ctrlc::set_handler(move || {
            if abort.trigger() {
                tracing::info!("Shutdown signal received, finishing current tick...");
            } else {
                tracing::warn!("Shutdown already in progress");
            }
        })
    }
}
