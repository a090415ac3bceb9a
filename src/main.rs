use std::process::ExitCode;

use clap::Parser;
use sensorbridge::{bridge, logging, Config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = Config::parse();
    logging::init(config.verbose);

    tracing::info!("sensorbridge v{}", env!("CARGO_PKG_VERSION"));

    match bridge::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
