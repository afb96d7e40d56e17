//! Unix socket transport.
//!
//! - command socket: one JSON request per line, one JSON reply per line
//! - notify socket: every subscriber receives `sfp <json>` lines
//! - monitor socket: every subscriber receives a `sfpmonitor` line, a
//!   big-endian u32 payload length, then the binary frame

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, WriteBytesExt};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::config_file::EndpointsConfig;
use crate::error::Result;
use crate::monitor::MonitorMessage;
use crate::service::BrokerHandle;

/// Binds a listening socket at `path` with permission bits `mode`,
/// replacing a stale socket file.
pub fn bind(path: &Path, mode: u32) -> Result<UnixListener> {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(path)?;
    fs::set_permissions(path, Permissions::from_mode(mode))?;
    info!(path = %path.display(), mode = %format!("{mode:o}"), "listening");
    Ok(listener)
}

/// Wire record for one monitor message.
pub fn monitor_record(message: &MonitorMessage) -> Result<Vec<u8>> {
    let mut record = Vec::with_capacity(message.topic.len() + 5 + message.payload.len());
    record.extend_from_slice(message.topic.as_bytes());
    record.push(b'\n');
    let length = u32::try_from(message.payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "monitor frame too large"))?;
    WriteBytesExt::write_u32::<BigEndian>(&mut record, length)?;
    record.extend_from_slice(&message.payload);
    Ok(record)
}

/// The three sockets in front of a broker.
pub struct SocketServer {
    handle: BrokerHandle,
    command: UnixListener,
    notify: UnixListener,
    monitor: UnixListener,
    owned: Vec<PathBuf>,
}

impl SocketServer {
    /// Binds the configured sockets. `activated` replaces the command
    /// socket when the supervisor passed one in.
    pub fn bind(
        endpoints: &EndpointsConfig,
        handle: BrokerHandle,
        activated: Option<UnixListener>,
    ) -> Result<Self> {
        let mut owned = Vec::new();

        let command = match activated {
            Some(listener) => {
                info!("using activated command socket");
                listener
            }
            None => {
                owned.push(endpoints.command_socket.clone());
                bind(&endpoints.command_socket, endpoints.socket_mode)?
            }
        };

        let notify = bind(&endpoints.notify_socket, endpoints.socket_mode)?;
        owned.push(endpoints.notify_socket.clone());
        let monitor = bind(&endpoints.monitor_socket, endpoints.socket_mode)?;
        owned.push(endpoints.monitor_socket.clone());

        Ok(Self {
            handle,
            command,
            notify,
            monitor,
            owned,
        })
    }

    /// Serves until `shutdown` turns true, then removes the socket files
    /// this server created.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let Self {
            handle,
            command,
            notify,
            monitor,
            owned,
        } = self;

        tokio::join!(
            accept_loop("command", command, handle.clone(), shutdown.clone(), serve_commands),
            accept_loop("notify", notify, handle.clone(), shutdown.clone(), serve_notifications),
            accept_loop("monitor", monitor, handle, shutdown, serve_monitor),
        );

        for path in owned {
            if let Err(e) = fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "socket cleanup");
            }
        }
    }
}

async fn accept_loop<F, Fut>(
    name: &'static str,
    listener: UnixListener,
    handle: BrokerHandle,
    shutdown: watch::Receiver<bool>,
    serve: F,
) where
    F: Fn(UnixStream, BrokerHandle, watch::Receiver<bool>) -> Fut,
    Fut: std::future::Future<Output = io::Result<()>> + Send + 'static,
{
    let mut stop = shutdown.clone();
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, _)) => {
                    debug!(socket = name, "client connected");
                    let connection = serve(stream, handle.clone(), shutdown.clone());
                    tokio::spawn(async move {
                        if let Err(e) = connection.await {
                            debug!(socket = name, error = %e, "client connection ended");
                        }
                    });
                }
                Err(e) => error!(socket = name, error = %e, "accept failed"),
            },
            _ = stopped(&mut stop) => {
                debug!(socket = name, "accept loop stopping");
                return;
            }
        }
    }
}

/// Resolves once `shutdown` turns true or its sender is dropped.
pub async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn serve_commands(
    stream: UnixStream,
    handle: BrokerHandle,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = stopped(&mut shutdown) => return Ok(()),
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Value>(&line) {
            Ok(request) => match handle.request(request).await {
                Ok(reply) => reply,
                Err(e) => json!({"result": e.to_string()}),
            },
            Err(_) => json!({"result": "bad command"}),
        };

        let mut out = reply.to_string();
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
    }
}

async fn serve_notifications(
    stream: UnixStream,
    handle: BrokerHandle,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut notifications = handle.subscribe();
    let (_, mut writer) = stream.into_split();

    loop {
        let notification = tokio::select! {
            received = notifications.recv() => received,
            _ = stopped(&mut shutdown) => return Ok(()),
        };
        match notification {
            Ok(notification) => {
                let mut line = notification.line();
                line.push('\n');
                writer.write_all(line.as_bytes()).await?;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "notify subscriber lagging");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

async fn serve_monitor(
    stream: UnixStream,
    handle: BrokerHandle,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut frames = handle.subscribe_monitor();
    let (_, mut writer) = stream.into_split();

    loop {
        let message = tokio::select! {
            received = frames.recv() => received,
            _ = stopped(&mut shutdown) => return Ok(()),
        };
        match message {
            Ok(message) => {
                let record = monitor_record(&message)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                writer.write_all(&record).await?;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "monitor subscriber lagging");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}
