// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Server loop.
//
// Serves exactly one client at a time until shutdown:
// LISTENING -> SERVING -> DRAINING -> (debounce) -> LISTENING.
// A session error only ends the session; accept and group-load failures
// end the process.

use std::sync::Arc;

use crate::abort::AbortController;
use crate::config::SessionConfig;
use crate::error::ServerError;
use crate::executor::MotionExecutor;
use crate::session::{SessionEnd, SessionHandler};
use crate::transport::{Connection, Listener};

/// Server loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Listening,
    Serving,
    Draining,
    ShuttingDown,
}

/// Single-client trajectory server.
pub struct Server<L: Listener, E: MotionExecutor> {
    config: SessionConfig,
    listener: L,
    executor: E,
    abort: Arc<AbortController>,
    state: ServerState,
    sessions_served: u64,
}

impl<L: Listener, E: MotionExecutor> Server<L, E> {
    /// Create a server. The configuration gate runs here.
    pub fn new(
        config: SessionConfig,
        listener: L,
        executor: E,
        abort: Arc<AbortController>,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self {
            config,
            listener,
            executor,
            abort,
            state: ServerState::Listening,
            sessions_served: 0,
        })
    }

    /// Serve clients until shutdown or a process-fatal error.
    pub fn run(&mut self) -> Result<(), ServerError> {
        tracing::info!(
            "Trajectory server up (group {}, threshold {}, tick {:?})",
            self.config.group_id,
            self.config.buffer_threshold,
            self.config.tick_period()
        );
        let result = loop {
            match self.serve_one() {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => {
                    tracing::error!("Server stopping: {}", e);
                    break Err(e);
                }
            }
        };
        self.state = ServerState::ShuttingDown;
        tracing::info!(
            "Trajectory server stopped after {} sessions",
            self.sessions_served
        );
        result
    }

    /// Accept and serve one client. Returns `Ok(false)` once shutdown has
    /// been requested and the server must not listen again.
    pub fn serve_one(&mut self) -> Result<bool, ServerError> {
        self.state = ServerState::Listening;
        tracing::info!("Waiting for a streaming client on port {}", self.config.port);

        let accepted = self
            .listener
            .accept(&self.abort)
            .map_err(ServerError::Accept)?;
        let Some(mut conn) = accepted else {
            self.state = ServerState::ShuttingDown;
            return Ok(false);
        };

        self.state = ServerState::Serving;
        let peer = conn.peer();
        tracing::info!("Client connected from {}", peer);

        let group = match self.executor.load_group_info(self.config.group_id) {
            Ok(group) => group,
            Err(source) => {
                conn.force_close();
                return Err(ServerError::GroupInfo {
                    group: self.config.group_id,
                    source,
                });
            }
        };

        if let Some(unblocker) = conn.unblocker() {
            self.abort.arm(unblocker);
        }

        let outcome = SessionHandler::new(
            &self.config,
            &mut conn,
            &mut self.executor,
            group,
            &self.abort,
        )
        .run();

        self.state = ServerState::Draining;
        match outcome {
            Ok(SessionEnd::PeerClosed) => tracing::info!("Client {} disconnected", peer),
            Ok(SessionEnd::Shutdown) => tracing::info!("Session with {} ended by shutdown", peer),
            Err(e) => tracing::warn!("Session with {} aborted: {}", peer, e),
        }
        conn.force_close();
        self.abort.disarm();
        self.sessions_served += 1;

        if self.abort.is_triggered() {
            self.state = ServerState::ShuttingDown;
            return Ok(false);
        }
        // Debounce before re-listening; shutdown cuts it short.
        if !self.abort.sleep(self.config.accept_retry_delay()) {
            self.state = ServerState::ShuttingDown;
            return Ok(false);
        }
        Ok(true)
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn sessions_served(&self) -> u64 {
        self.sessions_served
    }
}
