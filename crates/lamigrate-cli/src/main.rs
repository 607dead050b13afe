#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;
mod project;

use clap::Parser;
use lamigrate_core::{HostGeneration, MigrationConfig};
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lamigrate")]
#[command(author, version, about = "Rewrite Zend Framework requirements of a Composer project to Laminas", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Plugin API generation to emulate: legacy, v1 or v2
    #[arg(long, global = true, default_value = "v2", env = "LAMIGRATE_GENERATION")]
    generation: HostGeneration,

    /// Answer every confirmation prompt with "yes"
    #[arg(short, long, global = true)]
    yes: bool,

    /// Behave as if the host runs without dev requirements
    #[arg(long, global = true)]
    no_dev: bool,

    /// Composer executable used for lock updates and removals
    #[arg(long, global = true, default_value = "composer", env = "LAMIGRATE_COMPOSER")]
    composer: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the successor of each package name
    Name {
        /// Package names (e.g. zendframework/zend-mvc)
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Print a command's package arguments as the migration rewrites them
    Args {
        /// Composer command (only `require` is rewritten)
        command: String,

        /// Package arguments (`name`, `name:version` or `name=version`)
        #[arg(allow_hyphen_values = true)]
        packages: Vec<String>,
    },

    /// Replace installed Zend Framework packages in the project
    Migrate {
        /// Forward `--ignore-platform-reqs` to the final lock update
        #[arg(long)]
        ignore_platform_reqs: bool,

        /// Forward `--ignore-platform-req=<REQ>` to the final lock update
        #[arg(long, value_name = "REQ")]
        ignore_platform_req: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.json);

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Name { packages } => commands::name::run(&packages, cli.json),
        Commands::Args { command, packages } => commands::args::run(&command, &packages, cli.json),
        Commands::Migrate {
            ignore_platform_reqs,
            ignore_platform_req,
        } => {
            let mut config = MigrationConfig::new(cwd)
                .with_generation(cli.generation)
                .with_dev_mode(!cli.no_dev)
                .with_assume_yes(cli.yes)
                .with_verbosity(cli.verbose);
            if ignore_platform_reqs {
                config = config.with_lock_update_option("ignore-platform-reqs", None);
            }
            for requirement in ignore_platform_req {
                config = config.with_lock_update_option("ignore-platform-req", Some(requirement));
            }

            commands::migrate::run(config, &cli.composer, cli.json)
        }
    }
}
