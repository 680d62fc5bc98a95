use clap::Parser;
use flagstore::cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match Cli::parse().run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("flagstore: {}", e);
            ExitCode::FAILURE
        }
    }
}
