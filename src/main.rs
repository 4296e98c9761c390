//! herald - alert and event dispatcher
//!
//! A command-line daemon that watches host metrics, accepts external reports
//! and delivers deduplicated notifications.

use clap::Parser;
use herald::cli::args::{generate_completions, Cli, Commands};
use herald::commands::{run_check, run_daemon, run_normalize, run_sample};
use herald::error::{AppError, ConfigError, IngressError};

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; -v raises the default level
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Run the appropriate command
    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Run(args) => run_daemon(args, cli.format, config),

        Commands::Check => run_check(cli.format, config),

        Commands::Sample => run_sample(cli.format, config),

        Commands::Normalize(args) => run_normalize(args, cli.format, config),

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Config(ConfigError::FileNotFound(_)) => {
            eprintln!();
            eprintln!("Hint: Pass --config or set HERALD_CONFIG, or create one of:");
            eprintln!("      /etc/herald/config.toml, ~/.config/herald/config.toml, ./herald.toml");
        }
        AppError::Config(ConfigError::InvalidValue { .. }) => {
            eprintln!();
            eprintln!("Hint: Run 'herald check' to see the effective configuration.");
        }
        AppError::Ingress(IngressError::Schema(_)) => {
            eprintln!();
            eprintln!("Hint: Reports must be JSON objects with their required fields present;");
            eprintln!("      metadata values must be strings, numbers or booleans and");
            eprintln!("      timestamps must be ISO 8601.");
        }
        _ => {}
    }
}
