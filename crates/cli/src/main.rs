use std::process::ExitCode;

fn main() -> ExitCode {
    slashgate_cli::run()
}
