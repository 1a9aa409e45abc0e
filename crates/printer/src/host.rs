//! Stdio plugin host
//!
//! Reads [`Invoke`](protocol::Invoke) lines, runs each on a blocking worker so
//! a slow bulk write does not hold up other calls, and writes one response
//! line per invocation. Permission events from the bridge are interleaved on
//! the same output as event lines.
//!
//! Output order follows completion order; the shell matches responses by id.

use crate::plugin::PrinterPlugin;
use anyhow::{Context, Result};
use common::{DeviceSource, PermissionEvents};
use protocol::{
    HostEvent, InvokeResponse, LineReader, ProtocolError, decode_invoke, encode_line,
    write_line_async,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Queue an encoded message for the writer task
fn emit<T: Serialize>(out: &mpsc::UnboundedSender<String>, message: &T) {
    match encode_line(message) {
        Ok(line) => {
            if out.send(line).is_err() {
                warn!("Output closed, dropping message");
            }
        }
        Err(e) => warn!("Failed to encode message: {}", e),
    }
}

/// Answer an undecodable line so the shell sees the failure
fn reject_malformed(out: &mpsc::UnboundedSender<String>, error: &ProtocolError) {
    warn!("Malformed request: {}", error);
    emit(out, &InvokeResponse::rejected(None, format!("Malformed request: {}", error)));
}

/// Serve invocations from `reader` until EOF
///
/// Returns once every in-flight invocation has been answered and the output
/// has been flushed.
pub async fn serve<S, R, W>(
    plugin: Arc<PrinterPlugin<S>>,
    events: PermissionEvents,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    S: DeviceSource + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            write_line_async(&mut writer, &line).await?;
        }
        Ok::<_, protocol::ProtocolError>(())
    });

    let mut lines = LineReader::new(BufReader::new(reader));
    let mut tasks = JoinSet::new();
    let mut events_open = true;
    let mut read_error = None;

    info!("Plugin host ready");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("Input closed");
                        break;
                    }
                    Err(e @ ProtocolError::LineTooLong { .. }) => {
                        reject_malformed(&out_tx, &e);
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to read from input: {}", e);
                        read_error = Some(e);
                        break;
                    }
                };
                if line.trim_ascii().is_empty() {
                    continue;
                }

                let invoke = match decode_invoke(&line) {
                    Ok(invoke) => invoke,
                    Err(e) => {
                        reject_malformed(&out_tx, &e);
                        continue;
                    }
                };

                let plugin = Arc::clone(&plugin);
                let out = out_tx.clone();
                tasks.spawn(async move {
                    let id = invoke.id;
                    let response = match tokio::task::spawn_blocking(move || plugin.invoke(invoke)).await {
                        Ok(response) => response,
                        Err(e) => InvokeResponse::rejected(Some(id), format!("Invocation aborted: {}", e)),
                    };
                    if !response.is_resolved() {
                        debug!("Invocation {} rejected", id);
                    }
                    emit(&out, &response);
                });
            }

            event = events.recv(), if events_open => match event {
                Ok(event) => {
                    debug!("Permission event: {:?}", event);
                    emit(&out_tx, &HostEvent::from(event));
                }
                Err(_) => {
                    debug!("Permission bridge closed");
                    events_open = false;
                }
            },

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!("Invocation task failed: {}", e);
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("Invocation task failed: {}", e);
        }
    }

    // Forward events that arrived while the last calls finished
    while let Some(event) = events.try_recv() {
        emit(&out_tx, &HostEvent::from(event));
    }

    drop(out_tx);
    writer_task
        .await
        .context("Writer task panicked")?
        .context("Failed to write output")?;

    if let Some(e) = read_error {
        return Err(e).context("Failed to read from input");
    }

    info!("Plugin host stopped");
    Ok(())
}
