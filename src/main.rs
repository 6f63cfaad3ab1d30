#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scanflow_lib::run().await
}
