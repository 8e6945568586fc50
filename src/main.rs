#[tokio::main]
async fn main() -> anyhow::Result<()> {
    recovery_api::run().await
}
