use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    validate_xsd::run(std::env::args_os(), io::stdout(), io::stderr()).into()
}
