use std::process::ExitCode;

fn main() -> ExitCode {
    permbot_cli::run()
}
