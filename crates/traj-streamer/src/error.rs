// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy.
//!
//! Process-fatal: [`ConfigError`] and [`ServerError`]. Session-fatal:
//! [`SessionError`] and everything it wraps; the server loop disconnects
//! and re-listens. An unsupported command code and a busy executor are
//! not errors at all: they travel on the success path as
//! [`Command::Unsupported`](crate::protocol::Command::Unsupported) and
//! [`Dispatch::Busy`](crate::dispatcher::Dispatch::Busy).

use thiserror::Error;

/// Configuration errors. Fatal at process start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration not confirmed by an operator (set `checked = true` after review)")]
    NotChecked,
}

/// Byte transport errors. Fatal to the current session only.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("framing error: {0}")]
    Framing(String),
}

/// Wire decode failures. Fatal to the session: the framing state can no
/// longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("length prefix {declared} does not match frame body of {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("unexpected message type {0}")]
    UnexpectedType(u32),

    #[error("position block of {0} bytes is not a whole number of joints")]
    Misaligned(usize),

    #[error("point carries {got} joint positions, group has {expected}")]
    DofMismatch { expected: usize, got: usize },

    #[error("unknown reply result code {0}")]
    UnknownResult(i32),
}

/// Failures reported by a motion executor adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("slot {0} is not mapped")]
    UnknownSlot(u16),

    #[error("group {0} is not configured")]
    UnknownGroup(u32),

    #[error("executor fault: {0}")]
    Fault(String),
}

/// Joint positions that cannot be expressed in executor-native units.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("point has {got} joints, group {group} has {expected}")]
    DofMismatch {
        group: u32,
        expected: usize,
        got: usize,
    },

    #[error("joint {axis} position {value} is not finite")]
    NonFinite { axis: usize, value: f64 },

    #[error("joint {axis} position {value} rad overflows the native range")]
    OutOfRange { axis: usize, value: f64 },
}

/// Dispatch failures other than a busy executor. Never retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("translation failed: {0}")]
    Translate(#[from] TranslateError),

    #[error("executor write failed: {0}")]
    Executor(#[from] ExecutorError),

    #[error("readiness wait cancelled by shutdown")]
    Cancelled,
}

/// Reasons a session ends abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol desynchronization suspected: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("dispatch: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Process-fatal server errors. None has a degraded mode.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] TransportError),

    #[error("loading group {group} failed: {source}")]
    GroupInfo {
        group: u32,
        #[source]
        source: ExecutorError,
    },
}
