use std::process::ExitCode;

fn main() -> ExitCode {
    formfill_cli::main_entry()
}
