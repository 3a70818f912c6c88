use genimg::{cli, Backend};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    cli::run_cli(Backend::OpenAi, std::env::args_os()).await
}
