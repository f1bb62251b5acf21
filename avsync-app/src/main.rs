mod app;
mod audio;
mod cli;
mod output;
mod sink;

use app::App;
use clap::Parser;
use cli::Args;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let app = App::new(args)?;
    app.run()?;

    Ok(())
}
