// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Trajectory streaming server CLI
//!
//! # Usage
//!
//! ```bash
//! # Write an example configuration, review it, then set `checked = true`
//! traj-streamer gen-config --output streamer.toml
//!
//! # Check a configuration without starting the server
//! traj-streamer validate --config streamer.toml
//!
//! # Serve
//! traj-streamer --config streamer.toml --log-level debug
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use traj_streamer::{
    AbortController, GroupInfo, Server, ServerError, SessionConfig, SimulatedExecutor,
    TcpTransport,
};

/// Joint trajectory streaming server
#[derive(Parser, Debug)]
#[command(name = "traj-streamer")]
#[command(about = "Streams joint trajectory points from a TCP client to a motion executor")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "streamer.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let Some(config_path) = args.config else {
        eprintln!("Missing --config");
        std::process::exit(1);
    };
    let loaded = SessionConfig::from_file(&config_path);

    let level = match (&args.log_level, &loaded) {
        (Some(level), _) => level.clone(),
        (None, Ok(config)) => config.log_level.clone(),
        (None, Err(_)) => "info".to_string(),
    };
    init_logging(&level);

    // Configuration gate
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Refusing to start: {}", e);
            eprintln!("Configuration invalid ({}): {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = serve(config) {
        tracing::error!("{}", e);
        eprintln!("traj-streamer: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn serve(config: SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let abort = Arc::new(AbortController::new());
    abort.install_signal_handler()?;

    let sim_config = config.simulator.clone().unwrap_or_default();
    let group = GroupInfo::new(config.group_id, sim_config.pulses_per_radian.clone());
    let executor = SimulatedExecutor::new(group, config.slots);
    let motion_loop = executor.spawn_motion_loop(sim_config.motion_time(), Arc::clone(&abort));

    let addr = config.listen_addr()?;
    let transport =
        TcpTransport::bind(addr, config.max_frame_bytes).map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    println!("Trajectory streamer v{}", env!("CARGO_PKG_VERSION"));
    println!("Listening on {}", addr);
    println!("Press Ctrl+C to stop...");

    let mut server = Server::new(config, transport, executor, Arc::clone(&abort))?;
    let result = server.run();

    abort.trigger();
    if motion_loop.join().is_err() {
        tracing::warn!("Simulated executor thread panicked");
    }

    result?;
    println!("Sessions served: {}", server.sessions_served());
    Ok(())
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = SessionConfig::example().to_toml_string()?;

    let content = format!(
        r#"# Trajectory streamer configuration
# Generated by traj-streamer gen-config
#
# Review every value against the executor setup, then set `checked = true`.

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match SessionConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Listen:      {}:{}", config.bind_address, config.port);
            println!("Group:       {}", config.group_id);
            println!("Tick:        {} ms", config.tick_period_ms);
            println!("Threshold:   {}", config.buffer_threshold);
            println!("Termination: {:?}", config.termination);
            if let Some(sim) = &config.simulator {
                println!("Simulator:   {} axes", sim.pulses_per_radian.len());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}
