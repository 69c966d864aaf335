use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    authz_cache_cli::cli::run().await
}
