use anyhow::Result;

use wos_redeem::orchestrator::App;
use wos_redeem::{logger, Config};

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let config = Config::from_env();
    let app = App::initialize(config).await?;
    app.run().await?;

    Ok(())
}
