//! netrepair - reset Ethernet adapters and refresh the network stack

use clap::Parser;
use netrepair::cli::Cli;
use netrepair::{app, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let code = match app::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
