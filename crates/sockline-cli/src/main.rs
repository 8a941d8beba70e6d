//! Sockline - interactive TCP client
//!
//! Connects to a server, sends every stdin line and prints every frame that
//! comes back. Exits on end of input, Ctrl+C, or when the server goes away.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sockline_codec::{FrameCodec, LengthDelimitedCodec, RawCodec};
use sockline_network::{TcpClient, TcpClientConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server address as host:port
    endpoint: String,

    /// JSON client configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How the byte stream is split into frames
    #[arg(short, long, value_enum, default_value_t = Framing::Raw)]
    framing: Framing,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Framing {
    /// Pass bytes through as they arrive
    Raw,
    /// Big-endian u32 length prefix per frame
    Length,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.framing {
        Framing::Raw => {
            let client = TcpClient::with_codec(config, RawCodec::new());
            run(client, &cli.endpoint, cli.framing).await
        }
        Framing::Length => {
            let client = TcpClient::with_codec(config, LengthDelimitedCodec::new());
            run(client, &cli.endpoint, cli.framing).await
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<TcpClientConfig> {
    let Some(path) = path else {
        return Ok(TcpClientConfig::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Turn one stdin line into a payload.
///
/// Raw framing has no frame boundaries on the wire, so the line terminator
/// stripped by `lines()` is put back.
fn line_payload(line: String, framing: Framing) -> String {
    match framing {
        Framing::Raw => line + "\n",
        Framing::Length => line,
    }
}

async fn run<C: FrameCodec>(client: TcpClient<C>, endpoint: &str, framing: Framing) -> Result<()> {
    let (closed_tx, mut closed) = mpsc::unbounded_channel();

    client.on_receive(|event| {
        if let Some(data) = event.data() {
            println!("{}", String::from_utf8_lossy(data));
        }
    });
    client.on_disconnect(move |event| {
        match event.error() {
            Some(e) => warn!("Connection dropped: {}", e),
            None => info!("Server closed the connection"),
        }
        let _ = closed_tx.send(());
    });

    client
        .connect(endpoint)
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;
    info!("Connected to {} (type lines to send, Ctrl+D to quit)", endpoint);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.is_empty() => continue,
                Some(line) => {
                    if let Err(e) = client.send_async(line_payload(line, framing)) {
                        error!("Send rejected: {}", e);
                        break;
                    }
                }
                None => break,
            },
            _ = closed.recv() => return Ok(()),
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, disconnecting");
                break;
            }
        }
    }

    client.close().await?;
    info!("Disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_framing_keeps_line_terminator() {
        assert_eq!(line_payload("hello".to_string(), Framing::Raw), "hello\n");
        assert_eq!(line_payload("hello".to_string(), Framing::Length), "hello");
    }
}
