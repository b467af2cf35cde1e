//! mkcdict CLI
//!
//! Decodes kernel scheduler and KVM traces into compressed cdict event logs
//! for offline analysis.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use sched_cdict::commands::{
    display_version, execute_convert, execute_decode, inspect_cdict_file, validate_args,
    ConvertArgs, DecodeArgs, FormatChoice,
};
use sched_cdict::utils::config::DEFAULT_CDICT_FILE;

/// mkcdict - scheduler and KVM trace decoder
#[derive(Parser, Debug)]
#[command(name = "mkcdict")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a trace into a cdict file
    Decode {
        /// Trace input (`perf script` text or raw JSON lines)
        input: PathBuf,

        /// Output cdict file
        #[arg(short, long, default_value = DEFAULT_CDICT_FILE)]
        output: PathBuf,

        /// Input format
        #[arg(long, value_enum, default_value_t = FormatChoice::Auto)]
        format: FormatChoice,

        /// TOML file mapping VM uuids to display names
        #[arg(long, env = "MKCDICT_NAME_MAP")]
        name_map: Option<PathBuf>,

        /// Do not inspect /proc (trace captured on another host)
        #[arg(long)]
        no_procfs: bool,

        /// Output path for a JSON run report (optional)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Convert a legacy cdict file to the current encoding, or rename its threads
    Convert {
        /// Legacy cdict file
        input: PathBuf,

        /// Output cdict file (defaults to <input>.v2.cdict)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// CSV thread map renaming threads (tid,libvirt_id,thread_type,uuid,chain_type,chain_id,nvf_name)
        #[arg(long)]
        map: Option<PathBuf>,
    },

    /// Show the content summary of a cdict file
    Inspect {
        /// cdict file
        file: PathBuf,

        /// CSV thread map applied before summarizing
        #[arg(long)]
        map: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Decode {
            input,
            output,
            format,
            name_map,
            no_procfs,
            report,
            summary,
        } => {
            let args = DecodeArgs {
                input,
                output,
                format,
                name_map,
                use_procfs: !no_procfs,
                report,
                print_summary: summary,
            };

            // Validate args first
            validate_args(&args)?;

            execute_decode(args)?;
        }

        Commands::Convert { input, output, map } => {
            execute_convert(ConvertArgs {
                input,
                output,
                thread_map: map,
            })?;
        }

        Commands::Inspect { file, map } => {
            inspect_cdict_file(file, map)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
