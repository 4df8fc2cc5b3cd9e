use std::process::ExitCode;

fn main() -> ExitCode {
    dicta_cli::run()
}
