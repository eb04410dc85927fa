use anyhow::Result;
use clap::Parser;
use relayout::Service;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "A keyboard layout correction daemon.", long_about = None)]
struct Args {
    /// Directory holding the configuration snapshot files.
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

/// Main entry point for the daemon.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init info logging.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"))
        .is_test(cfg!(test)) // Disable logs during testing.
        .try_init();

    let mut service = match args.config_dir {
        Some(dir) => Service::with_config_dir(dir)?,
        None => Service::new()?,
    };

    service.run().await
}
