// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection tick loop.
//!
//! One tick:
//!
//! 1. ask the transport how many complete frames are waiting;
//! 2. if none, go straight to flow control;
//! 3. read and decode exactly one frame (decode failure ends the session);
//! 4. a negative sequence is a command: STOP clears the buffer, cancels
//!    motion and is ACKed, anything else is NACKed; flow control is skipped;
//! 5. otherwise append the point;
//! 6. flow control may send one ACK;
//! 7. with an empty buffer the tick ends;
//! 8. clear any pending cancel and poll-dispatch the buffer head.
//!
//! Between ticks the loop sleeps for the tick period and then checks the
//! shutdown flag; a tick in progress always runs to completion.

use std::time::Duration;

use crate::abort::AbortController;
use crate::buffer::TrajectoryBuffer;
use crate::config::SessionConfig;
use crate::dispatcher::{Dispatch, DispatchMode, MotionDispatcher};
use crate::error::{SessionError, TransportError};
use crate::executor::{GroupInfo, MotionExecutor};
use crate::flow::FlowControlGate;
use crate::protocol::{self, Command, Reply, TrajectoryPoint};
use crate::stats::SessionStats;
use crate::transport::Connection;

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    PeerClosed,
}

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// End of stream from the client.
    PeerClosed,
    /// Shutdown flag observed at a tick boundary.
    Shutdown,
}

pub struct SessionHandler<'a, C, E>
where
    C: Connection + ?Sized,
    E: MotionExecutor + ?Sized,
{
    conn: &'a mut C,
    dispatcher: MotionDispatcher<'a, E>,
    abort: &'a AbortController,
    buffer: TrajectoryBuffer,
    gate: FlowControlGate,
    tick_period: Duration,
    last_sequence: Option<i32>,
    stats: SessionStats,
}

impl<'a, C, E> SessionHandler<'a, C, E>
where
    C: Connection + ?Sized,
    E: MotionExecutor + ?Sized,
{
    pub fn new(
        config: &SessionConfig,
        conn: &'a mut C,
        executor: &'a mut E,
        group: GroupInfo,
        abort: &'a AbortController,
    ) -> Self {
        let dispatcher = MotionDispatcher::new(
            executor,
            config.slots,
            group,
            config.termination.code(),
            abort,
        );
        Self {
            conn,
            dispatcher,
            abort,
            buffer: TrajectoryBuffer::new(),
            gate: FlowControlGate::new(config.buffer_threshold),
            tick_period: config.tick_period(),
            last_sequence: None,
            stats: SessionStats::default(),
        }
    }

    /// Tick until the peer hangs up, shutdown is requested, or a fatal
    /// error occurs.
    pub fn run(mut self) -> Result<SessionEnd, SessionError> {
        let peer = self.conn.peer();
        tracing::info!(
            "Session with {} started (group {}, {} axes)",
            peer,
            self.dispatcher.group().group_id(),
            self.dispatcher.group().dof()
        );

        let result = loop {
            if self.abort.is_triggered() {
                break Ok(SessionEnd::Shutdown);
            }
            match self.tick() {
                Ok(Tick::Continue) => {}
                Ok(Tick::PeerClosed) => break Ok(SessionEnd::PeerClosed),
                Err(e) => break Err(e),
            }
            std::thread::sleep(self.tick_period);
        };

        if !self.buffer.is_empty() {
            tracing::info!(
                "Discarding {} undispatched points from {}",
                self.buffer.len(),
                peer
            );
        }
        tracing::info!("Session with {} ended: {}", peer, self.stats);
        result
    }

    /// Run one tick of the protocol.
    pub fn tick(&mut self) -> Result<Tick, SessionError> {
        self.stats.ticks += 1;

        let available = match self.conn.pending_frames() {
            Ok(n) => n,
            Err(TransportError::Closed) => return Ok(Tick::PeerClosed),
            Err(e) => return Err(e.into()),
        };

        let mut command_handled = false;
        if available > 0 {
            let point = self.read_point()?;
            if let Some(command) = point.command_code() {
                self.handle_command(command)?;
                command_handled = true;
            } else {
                tracing::debug!("Accepted seq {}", point.sequence);
                self.last_sequence = Some(point.sequence);
                self.buffer.push(point);
                self.stats.points_accepted += 1;
            }
        }

        // A command tick already replied once; it never also ACKs a point.
        if !command_handled {
            self.flow_control()?;
        }

        if !self.buffer.is_empty() {
            self.dispatch_head()?;
        }
        Ok(Tick::Continue)
    }

    pub fn buffer(&self) -> &TrajectoryBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    fn read_point(&mut self) -> Result<TrajectoryPoint, SessionError> {
        let frame = self.conn.read_frame()?;
        self.stats.frames_read += 1;
        let point = protocol::decode_point(&frame, self.dispatcher.group().dof())?;
        Ok(point)
    }

    fn handle_command(&mut self, command: Command) -> Result<(), SessionError> {
        match command {
            Command::Stop => {
                let discarded = self.buffer.clear();
                self.dispatcher.cancel_motion();
                self.stats.stops += 1;
                self.stats.points_discarded += discarded as u64;
                tracing::info!("STOP received, discarded {} buffered points", discarded);
                self.send(Reply::ack(protocol::SEQ_STOP))
            }
            Command::Unsupported(code) => {
                tracing::warn!("Unsupported command code {}, replying NACK", code);
                self.send(Reply::nack(code))
            }
        }
    }

    fn flow_control(&mut self) -> Result<(), SessionError> {
        if !self.gate.permits(self.buffer.len(), self.buffer.outstanding()) {
            return Ok(());
        }
        if let Some(seq) = self.last_sequence {
            self.send(Reply::ack(seq))?;
            self.buffer.acknowledge_one();
        }
        Ok(())
    }

    fn dispatch_head(&mut self) -> Result<(), SessionError> {
        // A STOP in an earlier tick may have left the cancel asserted.
        self.dispatcher.reset_cancel();

        let Some(head) = self.buffer.front() else {
            return Ok(());
        };
        match self.dispatcher.dispatch(head, DispatchMode::Poll)? {
            Dispatch::Dispatched => {
                self.buffer.pop_front();
                self.stats.points_dispatched += 1;
            }
            Dispatch::Busy => self.stats.busy_polls += 1,
        }
        Ok(())
    }

    fn send(&mut self, reply: Reply) -> Result<(), SessionError> {
        self.conn.write(&reply.encode())?;
        if reply.is_ack() {
            self.stats.acks_sent += 1;
        } else {
            self.stats.nacks_sent += 1;
        }
        tracing::debug!("Sent {:?} for seq {}", reply.code, reply.sequence);
        Ok(())
    }
}
