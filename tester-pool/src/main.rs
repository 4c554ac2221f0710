/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use tester_pool::config::{self, main::MainConfig};
use tester_pool::context::Context;
use tester_pool::origin::{Origin, RunOrigin};
use tester_pool::resource::Counter;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Shared resource pool of a cellular test lab.
///
/// Example:
///   tester-pool -c /etc/tester/main.conf hold --suite suites/sms.conf
#[derive(Debug, Parser)]
#[command(
    name = "tester-pool",
    about = "Reserve and inspect shared test-lab resources",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML main configuration (state dir, resources file).
    #[arg(short = 'c', long = "main-config")]
    main_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate the resources file, print counts per kind.
    Check,

    /// Print the reservations currently persisted in the state directory.
    Status,

    /// Reserve what a suite asks for and keep it until Ctrl-C.
    Hold {
        /// Suite definition file.
        #[arg(short = 's', long = "suite")]
        suite: PathBuf,

        /// Scenario files combined onto the suite, in order.
        #[arg(long = "scenario")]
        scenarios: Vec<PathBuf>,
    },

    /// Advance a persistent counter and print the new value.
    Next {
        /// One of: msisdn, lac, rac, cellid, bvci.
        counter: Counter,
    },

    /// Drop every reservation held by a given origin id.
    Release {
        #[arg(long = "origin")]
        origin: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let main_config = match &cli.main_config {
        Some(path) => MainConfig::load_from_file(path)?,
        None => {
            warn!("No main configuration file provided, using defaults");
            MainConfig::default()
        }
    };
    let ctx = Context::init(main_config)?;

    match cli.command {
        Command::Check => {
            let all = ctx.pool().all_resources();
            for (kind, count) in all.counts() {
                println!("{kind}: {count}");
            }
            info!(resource_conf = %ctx.config().resource_conf.display(), "resources file is valid");
        }

        Command::Status => {
            let state = ctx.pool().reserved_state()?;
            if state.is_empty() {
                println!("no resources reserved");
            } else {
                print!("{}", config::tostr(&state.to_config())?);
            }
        }

        Command::Hold { suite, scenarios } => {
            let suite = ctx.load_suite(&suite, &scenarios)?;
            let mut reserved = ctx.reserve_suite(&suite)?;
            info!(
                suite = suite.name(),
                origin = reserved.origin().origin_id(),
                counts = ?reserved.counts(),
                "holding reservation, press Ctrl-C to release"
            );
            tokio::signal::ctrl_c()
                .await
                .context("Failed to wait for Ctrl-C")?;
            reserved.free()?;
            info!("reservation released");
        }

        Command::Next { counter } => {
            let origin = RunOrigin::new("tester-pool");
            let value = ctx.pool().next_persistent_value(counter, &origin)?;
            println!("{value}");
        }

        Command::Release { origin } => {
            let released = ctx.pool().release_origin(&origin)?;
            for (kind, count) in released.counts() {
                println!("{kind}: {count}");
            }
        }
    }

    ctx.shutdown();
    Ok(())
}
