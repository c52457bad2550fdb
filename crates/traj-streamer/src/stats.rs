// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-session counters.

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub frames_read: u64,
    pub points_accepted: u64,
    pub acks_sent: u64,
    pub nacks_sent: u64,
    pub stops: u64,
    pub points_discarded: u64,
    pub points_dispatched: u64,
    pub busy_polls: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks, {} frames, {} points ({} dispatched, {} discarded), {} ACK, {} NACK, {} STOP, {} busy polls",
            self.ticks,
            self.frames_read,
            self.points_accepted,
            self.points_dispatched,
            self.points_discarded,
            self.acks_sent,
            self.nacks_sent,
            self.stops,
            self.busy_polls
        )
    }
}
