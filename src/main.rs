use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::info;

use macro_pulse::cli::{dispatch, Cli};
use macro_pulse::config::Overrides;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting macro_pulse...");

    let cli = Cli::parse();
    dispatch(cli, Overrides::from_env()).await
}
