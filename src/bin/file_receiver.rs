use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::runtime::Builder;

use custom_dv::transfer::receiver::receive_file;

/// Receive a file over UDP, acknowledging each segment.
#[derive(Parser)]
#[command(name = "file-receiver")]
struct Cli {
    /// Where to write the received file.
    file: PathBuf,

    /// UDP port to listen on.
    port: u16,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        let received = receive_file(&cli.file, cli.port).await?;
        println!("Received {} ({} bytes)", cli.file.display(), received);
        Ok(())
    })
}
