//! The main entry point for the `amibump` command-line application.
//!
//! This file is responsible for parsing command-line arguments and
//! dispatching to the appropriate subcommand handler in the `amibump`
//! library.

use amibump::cli::{self, Commands};
use amibump::errors::Result;
use amibump::{config, processor, update};
use std::env;
use std::process;

fn main() -> Result<()> {
    // Bare invocation: print a quick start instead of a usage error.
    let args_vec: Vec<String> = env::args().collect();
    if args_vec.len() == 1 {
        println!("Update AMI references in configuration files to the latest versions\n");
        println!("QUICK START EXAMPLES:");
        println!("  amibump update --account-ids 137112412989 -f config.yaml");
        println!("  amibump update --account-ids 137112412989 -f infra/ --patterns 'my-app-*'");
        println!("  amibump extract config.yaml            # List AMI ids a file references");
        println!("  amibump init                           # Write a sample configuration");
        println!("  amibump undo -d infra/                 # Restore from backups\n");
        println!("Run 'amibump --help' for the full command list");
        process::exit(0);
    }

    let args = cli::parse_args();

    match args.command {
        Commands::Update(update_args) => update::run_update(update_args),
        Commands::Extract { file, format } => {
            update::init_logger(false);
            processor::run_extract(file, format)
        }
        Commands::Init { filename } => {
            update::init_logger(false);
            config::run_init(filename)
        }
        Commands::Undo { dir, keep_backups } => {
            update::init_logger(false);
            processor::run_undo(dir, keep_backups)
        }
    }
}
