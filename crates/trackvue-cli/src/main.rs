//! Trackvue CLI - inspect motion tracking sessions from the command line
//!
//! Sessions are the JSON serialization of [`trackvue_core::Tracking`], as
//! written by the surrounding application.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Trackvue - motion tracking session inspector
#[derive(Parser, Debug)]
#[command(name = "trackvue")]
#[command(about = "Inspect motion tracking sessions (tracks, dopesheet, stabilization)", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show objects, tracks and reconstruction state of a session
    Info {
        /// Session file path (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the dopesheet: tracked segments per channel plus coverage
    Dope {
        /// Session file path (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Sort channels by (name, longest, total, error)
        #[arg(short, long, default_value = "name")]
        sort: String,

        /// Reverse the sort order
        #[arg(long)]
        inverse: bool,
    },

    /// Print per-frame stabilization data over a frame range
    Stab {
        /// Session file path (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Frame width in pixels
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value = "1080")]
        height: u32,

        /// First frame
        #[arg(long, default_value = "1")]
        from: i32,

        /// Last frame
        #[arg(long, default_value = "100")]
        to: i32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Info { file } => commands::info(&file),
        Commands::Dope {
            file,
            sort,
            inverse,
        } => commands::dope(&file, &sort, inverse),
        Commands::Stab {
            file,
            width,
            height,
            from,
            to,
        } => commands::stab(&file, width, height, from, to),
    }
}
