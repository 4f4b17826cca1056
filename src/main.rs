use clap::Parser;
use facecheck_lib::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    facecheck_lib::run(Cli::parse()).await
}
