// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sibyl - paid advisory sessions over chat, phone and video.
//!
//! This is the binary entry point for the Sibyl service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config;
mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// Sibyl - paid advisory sessions over chat, phone and video.
#[derive(Parser, Debug)]
#[command(name = "sibyl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Sibyl service.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration before dispatching.
    let config = match sibyl_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            sibyl_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("sibyl serve failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            if let Err(e) = config::run_config(&config) {
                eprintln!("sibyl config failed: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("sibyl: use --help for available commands");
        }
    }
}
