// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hand-off of one trajectory point to the executor.
//!
//! In [`DispatchMode::Poll`] the readiness signal is sampled once and a busy
//! executor yields [`Dispatch::Busy`]; the caller retries next tick. The
//! next call's readiness poll is the only backpressure: data-ready is
//! raised and never waited on.

use std::time::Duration;

use crate::abort::AbortController;
use crate::error::DispatchError;
use crate::executor::{ExecutorPort, ExecutorSlots, GroupInfo, MotionExecutor};
use crate::protocol::TrajectoryPoint;

/// Readiness poll interval in blocking mode.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Sample readiness once; never wait.
    Poll,
    /// Wait for readiness. Fallback for callers that already know the
    /// executor is ready; the session loop never uses it.
    Blocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Dispatched,
    Busy,
}

/// Velocity fraction to an integer percentage in `[1, 100]`.
///
/// Zero is not representable on the executor, so anything below 1% is
/// raised to 1%. NaN maps to 1%.
pub fn velocity_percent(fraction: f64) -> i32 {
    ((fraction * 100.0).round() as i32).clamp(1, 100)
}

pub struct MotionDispatcher<'a, E: MotionExecutor + ?Sized> {
    port: ExecutorPort<'a, E>,
    group: GroupInfo,
    termination_code: i32,
    abort: &'a AbortController,
}

impl<'a, E: MotionExecutor + ?Sized> MotionDispatcher<'a, E> {
    pub fn new(
        executor: &'a mut E,
        slots: ExecutorSlots,
        group: GroupInfo,
        termination_code: i32,
        abort: &'a AbortController,
    ) -> Self {
        Self {
            port: ExecutorPort::new(executor, slots),
            group,
            termination_code,
            abort,
        }
    }

    pub fn group(&self) -> &GroupInfo {
        &self.group
    }

    pub fn dispatch(
        &mut self,
        point: &TrajectoryPoint,
        mode: DispatchMode,
    ) -> Result<Dispatch, DispatchError> {
        if mode == DispatchMode::Poll && !self.port.is_ready()? {
            return Ok(Dispatch::Busy);
        }

        let percent = velocity_percent(point.velocity_fraction);
        let target = self.group.to_native(&point.joint_positions)?;

        if mode == DispatchMode::Blocking {
            self.wait_ready()?;
        }

        // Slot order matters to the executor job: target, speed, termination.
        self.port.set_target_position(&target)?;
        self.port.set_velocity_percent(percent)?;
        self.port.set_termination_policy(self.termination_code)?;
        self.port.assert_data_ready()?;

        tracing::debug!(
            "Dispatched seq {} at {}% ({:?})",
            point.sequence,
            percent,
            target.pulses
        );
        Ok(Dispatch::Dispatched)
    }

    /// Ask the executor to abandon the motion in progress. Fire-and-forget.
    pub fn cancel_motion(&mut self) {
        if let Err(e) = self.port.request_cancel() {
            tracing::warn!("Cancel request not delivered: {}", e);
        }
    }

    /// Return the skip slot to neutral. Idempotent.
    pub fn reset_cancel(&mut self) {
        if let Err(e) = self.port.clear_cancel() {
            tracing::warn!("Cancel reset not delivered: {}", e);
        }
    }

    fn wait_ready(&self) -> Result<(), DispatchError> {
        loop {
            if self.port.is_ready()? {
                return Ok(());
            }
            if !self.abort.sleep(READY_POLL_INTERVAL) {
                return Err(DispatchError::Cancelled);
            }
        }
    }
}
