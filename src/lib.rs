mod cli;
mod commands;
mod render;
mod server;

use trait_affinity::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
