// SPDX-License-Identifier: MIT OR Apache-2.0
//! `flowgraph` - command line front end for node graph documents.
//!
//! Loads saved graphs through the same model the editor uses, so every
//! command exercises collision renaming, connection legality and the
//! structural invariant checks.

mod commands;

use clap::{Parser, Subcommand};
use commands::CommandError;
use egui::Vec2;
use flowgraph_graph::settings::SETTINGS_FILE_NAME;
use flowgraph_graph::EditorSettings;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(about = "Inspect, merge and check node graph documents", long_about = None)]
struct Cli {
    /// Settings file (RON); defaults are used when it does not exist
    #[arg(long, global = true, value_name = "PATH", default_value = SETTINGS_FILE_NAME)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the nodes, ports and connections of a document
    Inspect {
        /// Graph document
        #[arg(value_name = "PATH")]
        file: PathBuf,
    },
    /// Paste one document into another at an offset
    Merge {
        /// Document merged into
        #[arg(value_name = "PATH")]
        base: PathBuf,
        /// Document pasted in; colliding node names are renamed
        #[arg(value_name = "PATH")]
        other: PathBuf,
        /// Horizontal offset applied to pasted nodes
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dx: f32,
        /// Vertical offset applied to pasted nodes
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dy: f32,
        /// Output document; defaults to overwriting the base
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Verify that a document loads completely and consistently
    Check {
        /// Graph document
        #[arg(value_name = "PATH")]
        file: PathBuf,
    },
    /// Write a settings file with default values
    InitSettings,
}

fn run(cli: Cli) -> Result<(), CommandError> {
    if let Command::InitSettings = cli.command {
        commands::init_settings(&cli.settings)?;
        tracing::info!("Wrote default settings to {:?}", cli.settings);
        return Ok(());
    }

    let settings = EditorSettings::load_or_default(&cli.settings)?;
    match cli.command {
        Command::Inspect { file } => {
            print!("{}", commands::inspect(&file, &settings)?);
        }
        Command::Merge {
            base,
            other,
            dx,
            dy,
            output,
        } => {
            let output = output.unwrap_or_else(|| base.clone());
            let report = commands::merge(&base, &other, Vec2::new(dx, dy), &output, &settings)?;
            println!(
                "Merged {} node(s) and {} connection(s) into {}",
                report.nodes.len(),
                report.connections.len(),
                output.display()
            );
            for failure in &report.failures {
                println!("  ! {failure}");
            }
        }
        Command::Check { file } => {
            commands::check(&file, &settings)?;
            println!("{}: ok", file.display());
        }
        Command::InitSettings => {}
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("flowgraph_app=info,flowgraph_graph=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("flowgraph v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
