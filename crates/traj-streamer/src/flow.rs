// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ACK pacing policy.
//!
//! At most one ACK per tick, and only while the queue is below the
//! threshold with at least one point outstanding. Advisory only: a client
//! that ignores withheld ACKs still gets its points queued.

/// Decides whether the current tick may emit an ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControlGate {
    threshold: usize,
}

impl FlowControlGate {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn permits(&self, queue_len: usize, outstanding: usize) -> bool {
        queue_len < self.threshold && outstanding > 0
    }
}
