// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Joint-trajectory streaming server.
//!
//! Accepts a single streaming client over TCP, decodes fixed-size
//! trajectory-point frames, buffers them, paces the client with ACK/NACK
//! replies and hands points one at a time to a motion executor that
//! consumes them at its own pace.
//!
//! # Architecture
//!
//! ```text
//! Client                    traj-streamer                          Executor
//!   |                            |                                     |
//!   |--- point(seq=1) --------->| TrajectoryBuffer                    |
//!   |<-- ACK(1) ----------------| FlowControlGate                     |
//!   |                            |--- poll ready ---------------------->|
//!   |                            |--- target / speed / termination --->|
//!   |                            |--- data ready ---------------------->|
//!   |--- point(seq=-4) STOP ---->| clear buffer                        |
//!   |<-- ACK(-4) ---------------|--- skip = STOP --------------------->|
//! ```
//!
//! # Components
//!
//! | Component | Module |
//! |-----------|--------|
//! | Server loop (accept, serve, debounce) | [`server`] |
//! | Per-connection tick loop | [`session`] |
//! | Non-blocking handoff to the executor | [`dispatcher`] |
//! | FIFO of decoded points | [`buffer`] |
//! | ACK pacing policy | [`flow`] |
//! | Shutdown flag + connection unblocking | [`abort`] |
//! | Executor capability interface | [`executor`] |
//! | In-process executor | [`sim`] |
//!
//! The whole engine runs on one thread. The only concurrent actor is the
//! [`AbortController`], which may fire from a signal handler at any time.

pub mod abort;
pub mod buffer;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod flow;
pub mod protocol;
pub mod server;
pub mod session;
pub mod sim;
pub mod stats;
pub mod transport;

pub use abort::{AbortController, Unblocker};
pub use buffer::TrajectoryBuffer;
pub use config::{SessionConfig, SimulatorConfig, TerminationPolicy};
pub use dispatcher::{velocity_percent, Dispatch, DispatchMode, MotionDispatcher};
pub use error::{
    ConfigError, DispatchError, ExecutorError, ProtocolError, ServerError, SessionError,
    TranslateError, TransportError,
};
pub use executor::{
    ExecutorPort, ExecutorSlots, GroupInfo, MotionExecutor, NativePosition, SlotAddr,
    SKIP_NEUTRAL, SKIP_STOP,
};
pub use flow::FlowControlGate;
pub use protocol::{Command, Reply, ReplyCode, TrajectoryPoint};
pub use server::{Server, ServerState};
pub use session::{SessionEnd, SessionHandler, Tick};
pub use sim::{Motion, SimulatedExecutor};
pub use stats::SessionStats;
pub use transport::{Connection, FrameBuffer, Listener, TcpConnection, TcpTransport};
