#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatline::run().await
}
