use clap::Parser;
use hlsrec_cli::HlsrecArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    HlsrecArgs::parse().run().await
}
