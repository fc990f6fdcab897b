use std::process::ExitCode;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    match counting_limits::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
