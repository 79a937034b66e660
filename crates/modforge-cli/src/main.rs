//! # modforge CLI entry point
//!
//! Parses command-line arguments, sets up logging and dispatches to the
//! subcommand handlers in the library crate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modforge_cli::discover::{run_discover, DiscoverArgs};
use modforge_cli::generate::{run_generate, GenerateArgs};
use modforge_cli::install::{run_install, InstallArgs};
use modforge_cli::inventory::{run_inventory, InventoryArgs};
use modforge_cli::load_config;
use modforge_cli::validate::{run_validate, ValidateArgs};

/// Generate installable extension modules for an ERP runtime from
/// declarative specifications.
#[derive(Parser, Debug)]
#[command(name = "modforge", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Generator configuration file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a specification and print the report.
    Validate(ValidateArgs),

    /// Generate a package archive from a specification.
    Generate(GenerateArgs),

    /// Install a package archive into a runtime.
    Install(InstallArgs),

    /// List entities, fields and workflow states known to a runtime.
    Inventory(InventoryArgs),

    /// Write a specification extending every entity of a runtime.
    Discover(DiscoverArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);
    tracing::debug!("modforge CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args, &config),
        Commands::Generate(args) => run_generate(args, &config),
        Commands::Install(args) => run_install(args),
        Commands::Inventory(args) => run_inventory(args),
        Commands::Discover(args) => run_discover(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins over the verbosity flags. Logs go to stderr so command
/// output on stdout stays parseable.
fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
