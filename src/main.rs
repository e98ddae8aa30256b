use plume::Result;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    plume::cli::run().await
}
