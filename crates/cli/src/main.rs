use std::process::ExitCode;

fn main() -> ExitCode {
    propuesta_cli::run()
}
