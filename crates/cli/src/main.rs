use std::process::ExitCode;

fn main() -> ExitCode {
    leaveform_cli::run()
}
