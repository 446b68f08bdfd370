use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::runtime::Builder;

use custom_dv::transfer::sender::send_file;

/// Send a file over UDP with stop-and-wait retransmission.
#[derive(Parser)]
#[command(name = "file-sender")]
struct Cli {
    /// File to send.
    file: PathBuf,

    /// Receiver host name or address.
    host: String,

    /// Receiver UDP port.
    port: u16,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        let target = format!("{}:{}", cli.host, cli.port);
        let sent = send_file(&cli.file, &target).await?;
        println!("Sent {} ({} bytes) to {}", cli.file.display(), sent, target);
        Ok(())
    })
}
