use anyhow::Result;
use clap::Parser;

use plan_console::config::{Args, Config};
use plan_console::{logging, ui};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenv::dotenv();

    let args = Args::parse();
    let config = Config::from_args(args)?;
    config.validate()?;
    logging::init(&config.log_file)?;

    ui::terminal::app::run(config).await
}
