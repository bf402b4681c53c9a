use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match aura_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("aura: {e}");
            ExitCode::FAILURE
        }
    }
}
