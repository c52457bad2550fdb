// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process simulated executor.
//!
//! Behaves like a slot-driven controller job: raising data-ready latches the
//! written target, speed and termination into an in-flight motion and drops
//! readiness until the motion completes. Writing [`SKIP_STOP`] to the skip
//! slot aborts the motion in flight.
//!
//! Clones share one register file, so a test (or the motion thread) can
//! drive completion while the server owns another handle.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::abort::AbortController;
use crate::error::ExecutorError;
use crate::executor::{
    ExecutorSlots, GroupInfo, MotionExecutor, NativePosition, SlotAddr, SKIP_NEUTRAL, SKIP_STOP,
};

/// A latched motion command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Motion {
    pub target: NativePosition,
    pub velocity_percent: i32,
    pub termination: i32,
}

#[derive(Debug, Default)]
struct Registers {
    ready: bool,
    data_ready: bool,
    target: NativePosition,
    velocity: i32,
    termination: i32,
    skip: i32,
    in_flight: Option<Motion>,
    executed: Vec<Motion>,
    aborted: u64,
    faults: HashSet<SlotAddr>,
}

/// Cloneable in-memory executor.
#[derive(Clone)]
pub struct SimulatedExecutor {
    group: GroupInfo,
    slots: ExecutorSlots,
    regs: Arc<Mutex<Registers>>,
}

impl std::fmt::Debug for SimulatedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let regs = self.regs.lock();
        f.debug_struct("SimulatedExecutor")
            .field("group", &self.group.group_id())
            .field("ready", &regs.ready)
            .field("in_flight", &regs.in_flight.is_some())
            .field("executed", &regs.executed.len())
            .finish()
    }
}

impl SimulatedExecutor {
    /// Executor for one group, ready to accept a target.
    pub fn new(group: GroupInfo, slots: ExecutorSlots) -> Self {
        let regs = Registers {
            ready: true,
            skip: SKIP_NEUTRAL,
            ..Default::default()
        };
        Self {
            group,
            slots,
            regs: Arc::new(Mutex::new(regs)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.regs.lock().ready = ready;
    }

    pub fn is_ready(&self) -> bool {
        self.regs.lock().ready
    }

    /// Finish the in-flight motion and raise readiness again.
    pub fn complete_motion(&self) -> Option<Motion> {
        let mut regs = self.regs.lock();
        let done = regs.in_flight.take();
        if let Some(motion) = &done {
            regs.executed.push(motion.clone());
        }
        regs.ready = true;
        done
    }

    pub fn in_flight(&self) -> Option<Motion> {
        self.regs.lock().in_flight.clone()
    }

    /// Motions that ran to completion, oldest first.
    pub fn executed(&self) -> Vec<Motion> {
        self.regs.lock().executed.clone()
    }

    /// Whether the skip slot currently holds the cancel sentinel.
    pub fn cancel_requested(&self) -> bool {
        self.regs.lock().skip == SKIP_STOP
    }

    /// Number of motions cut short by a cancel.
    pub fn aborted_motions(&self) -> u64 {
        self.regs.lock().aborted
    }

    /// Make every subsequent write to `addr` fail.
    pub fn inject_fault(&self, addr: SlotAddr) {
        self.regs.lock().faults.insert(addr);
    }

    /// Complete each motion `motion_time` after it starts, until `abort` fires.
    pub fn spawn_motion_loop(
        &self,
        motion_time: Duration,
        abort: Arc<AbortController>,
    ) -> JoinHandle<()> {
        let sim = self.clone();
        std::thread::spawn(move || {
            tracing::debug!("Simulated executor motion loop started");
            while !abort.is_triggered() {
                if sim.in_flight().is_some() {
                    if !abort.sleep(motion_time) {
                        break;
                    }
                    if let Some(m) = sim.complete_motion() {
                        tracing::trace!("Simulated motion complete: {:?}", m.target.pulses);
                    }
                } else {
                    abort.sleep(Duration::from_millis(1));
                }
            }
            tracing::debug!("Simulated executor motion loop stopped");
        })
    }

    fn check_fault(regs: &Registers, addr: SlotAddr) -> Result<(), ExecutorError> {
        if regs.faults.contains(&addr) {
            return Err(ExecutorError::Fault(format!("write to slot {} rejected", addr)));
        }
        Ok(())
    }
}

impl MotionExecutor for SimulatedExecutor {
    fn load_group_info(&mut self, group_id: u32) -> Result<GroupInfo, ExecutorError> {
        if group_id == self.group.group_id() {
            Ok(self.group.clone())
        } else {
            Err(ExecutorError::UnknownGroup(group_id))
        }
    }

    fn read_signal(&self, addr: SlotAddr) -> Result<bool, ExecutorError> {
        let regs = self.regs.lock();
        if addr == self.slots.ready_signal {
            Ok(regs.ready)
        } else if addr == self.slots.data_ready_signal {
            Ok(regs.data_ready)
        } else {
            Err(ExecutorError::UnknownSlot(addr))
        }
    }

    fn write_signal(&mut self, addr: SlotAddr, on: bool) -> Result<(), ExecutorError> {
        let mut regs = self.regs.lock();
        Self::check_fault(&regs, addr)?;
        if addr != self.slots.data_ready_signal {
            return Err(ExecutorError::UnknownSlot(addr));
        }
        regs.data_ready = on;
        if on {
            // The job picks the command up at once and lowers data-ready.
            let motion = Motion {
                target: regs.target.clone(),
                velocity_percent: regs.velocity,
                termination: regs.termination,
            };
            regs.in_flight = Some(motion);
            regs.ready = false;
            regs.data_ready = false;
        }
        Ok(())
    }

    fn write_int(&mut self, addr: SlotAddr, value: i32) -> Result<(), ExecutorError> {
        let mut regs = self.regs.lock();
        Self::check_fault(&regs, addr)?;
        if addr == self.slots.velocity_var {
            regs.velocity = value;
        } else if addr == self.slots.termination_var {
            regs.termination = value;
        } else if addr == self.slots.skip_var {
            regs.skip = value;
            if value == SKIP_STOP && regs.in_flight.take().is_some() {
                regs.aborted += 1;
                regs.ready = true;
            }
        } else {
            return Err(ExecutorError::UnknownSlot(addr));
        }
        Ok(())
    }

    fn write_position(
        &mut self,
        addr: SlotAddr,
        position: &NativePosition,
    ) -> Result<(), ExecutorError> {
        let mut regs = self.regs.lock();
        Self::check_fault(&regs, addr)?;
        if addr != self.slots.target_position_var {
            return Err(ExecutorError::UnknownSlot(addr));
        }
        regs.target = position.clone();
        Ok(())
    }
}
