//! goldmint - buy 9StarGold tokens with ETH

use anyhow::Result;

use goldmint::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (GOLDMINT_RPC_URL, GOLDMINT_ACCOUNT)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
