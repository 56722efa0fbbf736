use clap::Parser;
use dotenvy::dotenv;

use halluapp::cli::Cli;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
