//! sysmon CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sysmon_cli::cli::{Cli, Commands};
use sysmon_cli::commands::{
    ExportCommand, InitCommand, MeasureCommand, MetricsCommand, PruneCommand, ShowCommand,
};
use sysmon_cli::output::OutputFormat;
use sysmon_cli::system::system_registry;
use sysmon_store::SystemClock;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), sysmon_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let config = cli.store_config()?;
    debug!(path = %config.path.display(), backend = ?config.backend, read_only = config.read_only, "store config");

    let clock = SystemClock;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Init => {
            let cmd = InitCommand::new(&config);
            cmd.execute(&mut stdout, &format)?;
        }
        Commands::Measure(args) => {
            let cmd = MeasureCommand::new(&config, &clock);
            cmd.execute(&mut stdout, &mut io::stderr(), &format, &args)?;
        }
        Commands::Show(args) => {
            let cmd = ShowCommand::new(&config, &clock);
            cmd.execute(&mut stdout, &format, &args)?;
        }
        Commands::Export(args) => {
            let cmd = ExportCommand::new(&config);
            cmd.execute(&mut stdout, &format, &args)?;
        }
        Commands::Prune(args) => {
            let cmd = PruneCommand::new(&config, &clock);
            cmd.execute(&mut stdout, &format, &args)?;
        }
        Commands::Metrics => {
            let registry = system_registry();
            let cmd = MetricsCommand::new(&registry);
            cmd.execute(&mut stdout, &format)?;
        }
    }

    Ok(())
}
