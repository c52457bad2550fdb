// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Motion executor adapter.
//!
//! Executors are driven through addressed slots rather than calls: signals
//! (booleans) and variables (integers, positions). [`MotionExecutor`] is the
//! raw slot interface a hardware adapter implements; [`ExecutorPort`] binds
//! it to the configured [`ExecutorSlots`] and exposes the narrow capability
//! set the dispatcher needs.

use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, TranslateError};

/// Address of an executor signal or variable.
pub type SlotAddr = u16;

/// Neutral value of the skip slot.
pub const SKIP_NEUTRAL: i32 = 0;

/// Skip-slot sentinel that cancels the motion in progress.
pub const SKIP_STOP: i32 = 1;

/// Slot assignment on the executor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSlots {
    /// Signal raised by the executor when it can take a new target.
    pub ready_signal: SlotAddr,
    /// Signal raised by us once a target has been written.
    pub data_ready_signal: SlotAddr,
    pub target_position_var: SlotAddr,
    pub velocity_var: SlotAddr,
    pub termination_var: SlotAddr,
    pub skip_var: SlotAddr,
}

impl Default for ExecutorSlots {
    fn default() -> Self {
        Self {
            ready_signal: 10,
            data_ready_signal: 11,
            target_position_var: 1,
            velocity_var: 2,
            termination_var: 3,
            skip_var: 4,
        }
    }
}

/// Joint target in executor units (encoder pulses).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativePosition {
    pub pulses: Vec<i32>,
}

/// Kinematic group description, loaded once per session.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    group_id: u32,
    pulses_per_radian: Vec<f64>,
}

impl GroupInfo {
    pub fn new(group_id: u32, pulses_per_radian: Vec<f64>) -> Self {
        Self {
            group_id,
            pulses_per_radian,
        }
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    /// Degrees of freedom.
    pub fn dof(&self) -> usize {
        self.pulses_per_radian.len()
    }

    /// Convert joint positions (radians) to native pulses.
    pub fn to_native(&self, positions: &[f64]) -> Result<NativePosition, TranslateError> {
        if positions.len() != self.dof() {
            return Err(TranslateError::DofMismatch {
                group: self.group_id,
                expected: self.dof(),
                got: positions.len(),
            });
        }

        let mut pulses = Vec::with_capacity(positions.len());
        for (axis, (&value, &ppr)) in positions.iter().zip(&self.pulses_per_radian).enumerate() {
            if !value.is_finite() {
                return Err(TranslateError::NonFinite { axis, value });
            }
            let scaled = (value * ppr).round();
            if scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
                return Err(TranslateError::OutOfRange { axis, value });
            }
            pulses.push(scaled as i32);
        }
        Ok(NativePosition { pulses })
    }
}

/// Raw slot interface of a motion executor.
pub trait MotionExecutor: Send {
    /// Load the group description. Called once at session start.
    fn load_group_info(&mut self, group_id: u32) -> Result<GroupInfo, ExecutorError>;

    fn read_signal(&self, addr: SlotAddr) -> Result<bool, ExecutorError>;

    fn write_signal(&mut self, addr: SlotAddr, on: bool) -> Result<(), ExecutorError>;

    fn write_int(&mut self, addr: SlotAddr, value: i32) -> Result<(), ExecutorError>;

    fn write_position(&mut self, addr: SlotAddr, position: &NativePosition)
        -> Result<(), ExecutorError>;
}

/// Executor bound to its slot map.
pub struct ExecutorPort<'a, E: MotionExecutor + ?Sized> {
    executor: &'a mut E,
    slots: ExecutorSlots,
}

impl<'a, E: MotionExecutor + ?Sized> ExecutorPort<'a, E> {
    pub fn new(executor: &'a mut E, slots: ExecutorSlots) -> Self {
        Self { executor, slots }
    }

    pub fn is_ready(&self) -> Result<bool, ExecutorError> {
        self.executor.read_signal(self.slots.ready_signal)
    }

    pub fn set_target_position(&mut self, position: &NativePosition) -> Result<(), ExecutorError> {
        self.executor
            .write_position(self.slots.target_position_var, position)
    }

    pub fn set_velocity_percent(&mut self, percent: i32) -> Result<(), ExecutorError> {
        self.executor.write_int(self.slots.velocity_var, percent)
    }

    pub fn set_termination_policy(&mut self, code: i32) -> Result<(), ExecutorError> {
        self.executor.write_int(self.slots.termination_var, code)
    }

    pub fn assert_data_ready(&mut self) -> Result<(), ExecutorError> {
        self.executor.write_signal(self.slots.data_ready_signal, true)
    }

    pub fn request_cancel(&mut self) -> Result<(), ExecutorError> {
        self.executor.write_int(self.slots.skip_var, SKIP_STOP)
    }

    pub fn clear_cancel(&mut self) -> Result<(), ExecutorError> {
        self.executor.write_int(self.slots.skip_var, SKIP_NEUTRAL)
    }
}
