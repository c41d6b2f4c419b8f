use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match rep_room::run_with_config().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
