use std::process;

use clap::error::ErrorKind;
use clap::Parser;
use zkmutex_cli::cli::Cli;
use zkmutex_cli::exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    let exit_code = match zkmutex_cli::execute(cli).await {
        Ok(code) => code,
        Err(e) => e.report(),
    };
    process::exit(exit_code);
}
