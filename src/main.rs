use std::process::ExitCode;

fn main() -> ExitCode {
    match seq2snp::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("ERROR: {error:#}");
            ExitCode::from(seq2snp::cli::exit_code(&error))
        }
    }
}
