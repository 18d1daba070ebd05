use clap::Parser;
use goenv::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = goenv::logging::init(&goenv::config::log_path())
        .inspect_err(|e| eprintln!("Warning: logging disabled: {e}"))
        .ok()
        .flatten();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(goenv::cli::run(cli))
}
