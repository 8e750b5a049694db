use std::io;
use std::path::PathBuf;

use clap::Parser;
use fastbook_kaggle::process_all_notebooks;
use log::info;

/// Make fastbook notebooks runnable on Kaggle, Colab or locally.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory to search for notebooks, recursively.
    #[arg(default_value = ".")]
    root: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut stdout = io::stdout().lock();
    let summary = process_all_notebooks(&cli.root, &mut stdout)?;
    info!("done: {summary}");
    Ok(())
}
