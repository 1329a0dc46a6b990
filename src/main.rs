//! Techstore CLI

use anyhow::Result;
use clap::Parser;

use techstore::{config::load_dotenv, observability::init_subscriber};

use crate::cli::Cli;

mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    load_dotenv();

    let cli = Cli::parse();

    init_subscriber(&cli.logging)?;

    cli.run().await
}
