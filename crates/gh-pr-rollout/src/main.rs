mod app;
mod cli;
mod table;
mod terminal;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use log::LevelFilter;
use rollout_config::AppConfig;

use crate::cli::Cli;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    // RUST_LOG wins over -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load();
    log::debug!("Config: {:?}", config);

    match app::run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e.to_string().red());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
