//! Thin binary entry point. All logic lives in the `server` crate.

use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = server::Config::from_env()?;
    server::run(config).await?;
    Ok(())
}
