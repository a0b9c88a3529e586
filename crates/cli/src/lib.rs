pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "propuesta",
    about = "Propuesta operator CLI",
    long_about = "Inspect configuration, check collaborator readiness, and run the proposal pipeline locally.",
    after_help = "Examples:\n  propuesta doctor --json\n  propuesta config\n  propuesta run --input intake.json --output propuesta.pdf"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog reachability, generative backend and converter")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run the full proposal pipeline on an intake file and write the document")]
    Run {
        #[arg(long, help = "Path to the intake JSON object")]
        input: PathBuf,
        #[arg(
            long,
            help = "Where to write the rendered document (default: Propuesta_<empresa>.<ext>)"
        )]
        output: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            let (exit_code, output) = commands::doctor::run(json);
            commands::CommandResult { exit_code, output }
        }
        Command::Run { input, output } => commands::run::run(&input, output.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
