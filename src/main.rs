use std::process::ExitCode;

fn main() -> ExitCode {
    match relock::cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
