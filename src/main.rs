mod app;
mod cli;
mod compose;
mod config;
mod curation;
mod delivery;
mod dlsite;
mod history;
mod record;
mod search;
mod site;
mod storage;
mod tags;
mod telegram;
mod twodfan;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}

pub fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
