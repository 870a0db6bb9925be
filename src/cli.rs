//! Command-line interface for the executor bridge.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xbridge")]
#[command(about = "Lower TF dialect modules to the TF executor dialect", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the lowering pipeline
    Pipeline {
        /// Include the control-to-data-outputs conversion
        #[arg(long)]
        enable_control_to_data: bool,
    },
    /// Lower a built-in sample module and print the result
    Demo {
        /// Number of replicas in the sample's replicate op
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
        replicas: u64,
        /// Raise the trace level (-v dumps before/after, -vv every pass)
        #[arg(short, long, action = ArgAction::Count)]
        verbose: u8,
        /// Write IR snapshots under this directory
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },
}
