//! `squigscan serve` — the message protocol over line-delimited JSON.
//!
//! Each stdin line is one inbound message; each reply is one stdout line.
//! Badge and status notifications are interleaved on stdout as they occur.
//! Malformed input gets an `{"error": ...}` line and the session goes on.

use anyhow::{Context, Result};
use serde::Serialize;
use squigscan::{
    detect_site, InboundMessage, OutboundMessage, PageSnapshot, PageWatcher, ScanConfig,
    WatcherHandle,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Start a session for `page` and serve it over `reader`/`writer` until
/// EOF or a `shutdown` message.
pub async fn run<R, W>(page: PageSnapshot, config: ScanConfig, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let verdict = detect_site(&page);
    let (handle, outbound, task) = if verdict.is_supported() {
        info!(host = ?verdict.host_match, indicators = ?verdict.indicators, "graph tool detected");
        PageWatcher::spawn(page, config)
    } else {
        // Keep answering the protocol, but never scan.
        warn!("page is not a graph tool; scanning disabled");
        PageWatcher::spawn_with(page, config, Vec::new())
    };

    let served = serve(&handle, outbound, reader, writer).await;
    let _ = handle.shutdown();
    let phase = task.await.context("page watcher task failed")?;
    debug!(?phase, "session ended");
    served
}

/// Pump messages between the session and a line-delimited JSON stream.
pub async fn serve<R, W>(
    handle: &WatcherHandle,
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read message")? else {
                    debug!("input closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let message = match serde_json::from_str::<InboundMessage>(line) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("invalid message: {e}");
                        write_line(&mut writer, &ErrorLine::new(format!("invalid message: {e}"))).await?;
                        continue;
                    }
                };
                let stop = matches!(message, InboundMessage::Shutdown);
                match handle.handle_message(message).await {
                    Ok(reply) => write_line(&mut writer, &reply).await?,
                    Err(e) => write_line(&mut writer, &ErrorLine::new(e.to_string())).await?,
                }
                if stop {
                    break;
                }
            }
            Some(notification) = outbound.recv() => {
                write_line(&mut writer, &notification).await?;
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ErrorLine {
    error: String,
}

impl ErrorLine {
    fn new(error: String) -> Self {
        Self { error }
    }
}

async fn write_line<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(value).context("failed to serialize message")?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .context("failed to write message")?;
    writer.flush().await.context("failed to flush output")?;
    Ok(())
}
