// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server configuration.
//!
//! Loaded once from TOML and gated before the server loop starts: a missing
//! required field, an invalid value, or `checked = false` is fatal.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::executor::ExecutorSlots;
use crate::protocol::{POINT_HEADER_SIZE, POSITION_SIZE};

/// How one motion segment ends before the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// Stop exactly on every target.
    Fine,
    /// Blend into the next segment; higher levels round corners more.
    Continuous { level: u8 },
}

impl TerminationPolicy {
    pub const MAX_LEVEL: u8 = 8;

    /// Value written to the executor's termination slot.
    pub fn code(self) -> i32 {
        match self {
            Self::Fine => 0,
            Self::Continuous { level } => i32::from(level),
        }
    }
}

/// Session and server parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Listen address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Listen port.
    pub port: u16,

    /// Period of the session tick loop (milliseconds).
    pub tick_period_ms: u64,

    /// Queue length at which ACKs are withheld.
    pub buffer_threshold: usize,

    /// Pause after a session ends before listening again (milliseconds).
    pub accept_retry_delay_ms: u64,

    /// Kinematic group served.
    pub group_id: u32,

    /// Largest accepted frame body.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Operator confirmation that this configuration was reviewed.
    #[serde(default)]
    pub checked: bool,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Motion termination policy.
    pub termination: TerminationPolicy,

    /// Executor slot map.
    pub slots: ExecutorSlots,

    /// In-process executor parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulator: Option<SimulatorConfig>,
}

/// Parameters of the simulated executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Encoder pulses per radian, one entry per axis.
    pub pulses_per_radian: Vec<f64>,

    /// Time to complete one motion (milliseconds).
    #[serde(default = "default_motion_time_ms")]
    pub motion_time_ms: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_max_frame_bytes() -> usize {
    4096
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_motion_time_ms() -> u64 {
    20
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            pulses_per_radian: vec![1000.0; 6],
            motion_time_ms: default_motion_time_ms(),
        }
    }
}

impl SimulatorConfig {
    pub fn motion_time(&self) -> Duration {
        Duration::from_millis(self.motion_time_ms)
    }
}

impl SessionConfig {
    /// Load and gate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and gate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Example configuration. Deliberately unchecked.
    pub fn example() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: 50240,
            tick_period_ms: 10,
            buffer_threshold: 8,
            accept_retry_delay_ms: 2000,
            termination: TerminationPolicy::Continuous { level: 3 },
            group_id: 0,
            slots: ExecutorSlots::default(),
            max_frame_bytes: default_max_frame_bytes(),
            checked: false,
            log_level: default_log_level(),
            simulator: Some(SimulatorConfig::default()),
        }
    }

    /// Validate values, then the operator confirmation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if self.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("tick_period_ms must be > 0".into()));
        }
        if self.buffer_threshold == 0 {
            return Err(ConfigError::Invalid("buffer_threshold must be > 0".into()));
        }
        if let TerminationPolicy::Continuous { level } = self.termination {
            if level == 0 || level > TerminationPolicy::MAX_LEVEL {
                return Err(ConfigError::Invalid(format!(
                    "termination level {} outside 1..={}",
                    level,
                    TerminationPolicy::MAX_LEVEL
                )));
            }
        }
        // At least one joint must fit in a frame
        if self.max_frame_bytes < POINT_HEADER_SIZE + POSITION_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_frame_bytes must be >= {}",
                POINT_HEADER_SIZE + POSITION_SIZE
            )));
        }

        let s = &self.slots;
        if s.ready_signal == s.data_ready_signal {
            return Err(ConfigError::Invalid(
                "ready_signal and data_ready_signal must differ".into(),
            ));
        }
        let vars = [
            s.target_position_var,
            s.velocity_var,
            s.termination_var,
            s.skip_var,
        ];
        if vars.iter().collect::<HashSet<_>>().len() != vars.len() {
            return Err(ConfigError::Invalid(
                "executor variable slots must be distinct".into(),
            ));
        }

        if let Some(sim) = &self.simulator {
            if sim.pulses_per_radian.is_empty() {
                return Err(ConfigError::Invalid(
                    "simulator.pulses_per_radian must list at least one axis".into(),
                ));
            }
            if let Some(bad) = sim
                .pulses_per_radian
                .iter()
                .find(|p| !p.is_finite() || **p == 0.0)
            {
                return Err(ConfigError::Invalid(format!(
                    "simulator.pulses_per_radian entry {} must be finite and non-zero",
                    bad
                )));
            }
        }

        if !self.checked {
            return Err(ConfigError::NotChecked);
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("bind_address '{}' is not an IP", self.bind_address))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn accept_retry_delay(&self) -> Duration {
        Duration::from_millis(self.accept_retry_delay_ms)
    }
}
