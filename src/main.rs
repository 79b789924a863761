mod cli;
mod commands;
mod config;
mod db;
mod display;
mod library;
mod metadata_tags;
mod playlist;
mod query;
mod record;
mod sort;

use clap::Parser;
use log::error;

fn main() {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    let cli = cli::Cli::parse();
    if let Err(err) = cli::run(cli) {
        error!("{err}");
        std::process::exit(1);
    }
}
