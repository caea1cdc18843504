use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    ballotbot_cli::cli::run().await
}
