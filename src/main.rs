use clap::Parser;
use subsearch::{Cli, init_logging, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli);
    run(cli).await
}
