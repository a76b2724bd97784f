use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use walld_core::ipc::{IpcRequest, IpcResponse};

use crate::rotation::DaemonCommand;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn serve_ipc(
    socket_path: PathBuf,
    cmd_tx: mpsc::Sender<DaemonCommand>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    // clean up stale socket
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    info!(path = %socket_path.display(), "IPC socket listening");

    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let tx = cmd_tx.clone();
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, tx).await {
                                warn!("IPC connection error: {e}");
                            }
                        });
                    }
                    Err(e) => warn!("IPC accept error: {e}"),
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown.changed() => {
                info!("IPC server shutting down");
                let _ = std::fs::remove_file(&socket_path);
                drain(&mut connections).await;
                return Ok(());
            }
        }
    }
}

/// Let in-flight connections write their replies, e.g. the answer to `quit`.
async fn drain(connections: &mut JoinSet<()>) {
    let pending = connections.len();
    if pending == 0 {
        return;
    }
    debug!(pending, "waiting for IPC connections");
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("abandoning {} IPC connections", connections.len());
    }
}

/// One request line in, one response line out.
async fn handle_connection(
    stream: UnixStream,
    cmd_tx: mpsc::Sender<DaemonCommand>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();
    buf_reader.read_line(&mut line).await?;

    let response = match serde_json::from_str::<IpcRequest>(line.trim()) {
        Ok(request) => {
            debug!(?request, "IPC request");
            forward(request, &cmd_tx).await
        }
        Err(e) => IpcResponse::error("invalid_request", format!("invalid request: {e}")),
    };

    let mut resp_line = serde_json::to_string(&response)?;
    resp_line.push('\n');
    writer.write_all(resp_line.as_bytes()).await?;
    Ok(())
}

async fn forward(request: IpcRequest, cmd_tx: &mpsc::Sender<DaemonCommand>) -> IpcResponse {
    let (respond, rx) = oneshot::channel();
    if cmd_tx
        .send(DaemonCommand::Request { request, respond })
        .await
        .is_err()
    {
        return IpcResponse::error("unavailable", "engine unavailable");
    }
    match rx.await {
        Ok(response) => response,
        Err(_) => IpcResponse::error("unavailable", "engine dropped response"),
    }
}
