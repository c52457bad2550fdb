// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! FIFO of decoded trajectory points plus the count of points not yet
//! acknowledged to the client.
//!
//! There is no admission limit; capacity only matters to the
//! [`FlowControlGate`](crate::flow::FlowControlGate).

use std::collections::VecDeque;

use crate::protocol::TrajectoryPoint;

#[derive(Debug, Default)]
pub struct TrajectoryBuffer {
    queue: VecDeque<TrajectoryPoint>,
    outstanding: usize,
}

impl TrajectoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail and count the point as outstanding.
    pub fn push(&mut self, point: TrajectoryPoint) {
        self.queue.push_back(point);
        self.outstanding += 1;
    }

    /// Oldest undispatched point.
    pub fn front(&self) -> Option<&TrajectoryPoint> {
        self.queue.front()
    }

    pub fn pop_front(&mut self) -> Option<TrajectoryPoint> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Points accepted but not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Record one ACK. Never goes below zero.
    pub fn acknowledge_one(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    /// Drop every buffered point and forget outstanding ACKs.
    ///
    /// Returns the number of points discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.queue.len();
        self.queue.clear();
        self.outstanding = 0;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(seq: i32) -> TrajectoryPoint {
        TrajectoryPoint::new(seq, vec![0.0], 1.0)
    }

    #[test]
    fn test_fifo_order() {
        let mut buf = TrajectoryBuffer::new();
        for seq in 1..=4 {
            buf.push(pt(seq));
        }
        assert_eq!(buf.front().map(|p| p.sequence), Some(1));
        let drained: Vec<i32> = std::iter::from_fn(|| buf.pop_front())
            .map(|p| p.sequence)
            .collect();
        assert_eq!(drained, vec![1, 2, 3, 4]);
        // Dispatch does not touch the ACK debt.
        assert_eq!(buf.outstanding(), 4);
    }

    #[test]
    fn test_outstanding_saturates_and_clears() {
        let mut buf = TrajectoryBuffer::new();
        buf.acknowledge_one();
        assert_eq!(buf.outstanding(), 0);

        buf.push(pt(1));
        buf.push(pt(2));
        buf.acknowledge_one();
        assert_eq!(buf.outstanding(), 1);

        assert_eq!(buf.clear(), 2);
        assert!(buf.is_empty());
        assert_eq!(buf.outstanding(), 0);
    }
}
