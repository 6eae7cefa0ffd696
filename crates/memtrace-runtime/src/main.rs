// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Replay driver for the access recorder.
// Run with: memtrace-runtime <command>

mod replay;
mod summarize;
mod trace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memtrace_core::config::DEFAULT_LOG_PREFIX;
use memtrace_core::{LogTarget, RecorderConfig};
use memtrace_recorder::Recorder;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memtrace-runtime")]
#[command(about = "Replays raw-event traces through the access recorder.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-lines trace, one thread per traced thread.
    Replay {
        /// The trace to replay.
        #[arg(long)]
        trace: PathBuf,
        /// Recorder configuration (JSON). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write one log per thread into this directory instead of the configured target.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Summarize one or more access logs.
    Summarize {
        /// The logs to read.
        #[arg(required = true)]
        logs: Vec<PathBuf>,
    },
}

#[derive(Serialize)]
struct ReplayOutput {
    replay: replay::ReplayReport,
    stats: memtrace_telemetry::StatsSnapshot,
}

fn load_config(path: Option<&PathBuf>, log_dir: Option<PathBuf>) -> Result<RecorderConfig> {
    let mut config = match path {
        Some(path) => RecorderConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => RecorderConfig::default(),
    };
    if let Some(directory) = log_dir {
        let prefix = match &config.log {
            LogTarget::PerThread { prefix, .. } => prefix.clone(),
            LogTarget::PerProcess { .. } => DEFAULT_LOG_PREFIX.to_string(),
        };
        config.log = LogTarget::PerThread { directory, prefix };
    }
    Ok(config)
}

fn run_replay(
    trace_path: PathBuf,
    config_path: Option<PathBuf>,
    log_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_ref(), log_dir)?;
    let trace = trace::Trace::load(&trace_path)?;

    let recorder = Recorder::from_config(config).context("failed to start the recorder")?;
    let recorder = memtrace_recorder::install(recorder)?;

    let report = replay::run(recorder, &trace);
    let stats = recorder.shutdown();

    let output = ReplayOutput {
        replay: report,
        stats,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Replay {
            trace,
            config,
            log_dir,
        } => run_replay(trace, config, log_dir),
        Command::Summarize { logs } => {
            let summary = summarize::summarize(&logs)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}
