//! TCP accept loop and per-connection reader

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use contracts::{Recipient, SharedRecipient};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, Lines};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, instrument, trace, warn};

use super::connection::{parse_handshake, parse_placement_update, ClientConnection};
use super::service::BrandService;
use crate::error::{CliError, Result};

/// How long a client may take to send its handshake line
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound TCP listener
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Bind `addr`
    ///
    /// # Errors
    /// Returns [`CliError::Bind`] when the address is unavailable.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::bind(addr, e))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped
    #[instrument(name = "server_accept_loop", skip(self, service))]
    pub async fn run(self, service: Arc<BrandService>) -> Result<()> {
        info!(addr = ?self.listener.local_addr().ok(), "Listening for clients");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            let service = Arc::clone(&service);
            tokio::spawn(async move {
                if let Err(e) = handle_stream(stream, peer, service).await {
                    debug!(peer = %peer, error = %e, "Connection ended with error");
                }
            });
        }
    }
}

async fn handle_stream(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<BrandService>,
) -> Result<()> {
    if let Err(e) = stream.set_nodelay(true) {
        trace!(peer = %peer, error = %e, "set_nodelay failed");
    }
    let (reader, writer) = stream.into_split();
    serve_connection(reader, writer, peer.to_string(), service).await
}

/// Handshake, register, then follow placement updates until EOF
pub async fn serve_connection<R, W>(
    reader: R,
    writer: W,
    peer: String,
    service: Arc<BrandService>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();

    let first = match tokio::time::timeout(HANDSHAKE_TIMEOUT, lines.next_line()).await {
        Ok(line) => line?,
        Err(_) => return Err(CliError::handshake("timed out")),
    };
    let Some(first) = first else {
        return Ok(());
    };
    let handshake = parse_handshake(&first)?;

    let registry = Arc::clone(service.registry());
    let (connection, _writer) = ClientConnection::spawn(
        registry.next_id(),
        handshake,
        writer,
        service.host().outbound_queue,
    );
    registry.insert(Arc::clone(&connection));
    info!(
        peer = %peer,
        client = %connection.display_name(),
        id = connection.id(),
        online = registry.len(),
        "Client connected"
    );

    service.on_connect(Arc::clone(&connection) as SharedRecipient);

    let result = follow_updates(&mut lines, &connection, &service).await;

    connection.close();
    registry.remove(connection.id());
    info!(
        peer = %peer,
        id = connection.id(),
        frames = connection.stats().frames_written(),
        online = registry.len(),
        "Client disconnected"
    );
    result
}

async fn follow_updates<R>(
    lines: &mut Lines<BufReader<R>>,
    connection: &Arc<ClientConnection>,
    service: &Arc<BrandService>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        match parse_placement_update(&line) {
            Some(placement) => {
                debug!(id = connection.id(), placement = ?placement, "Placement changed");
                connection.set_placement(placement);
                // a new placement is a new backend connection, greet again
                service.on_connect(Arc::clone(connection) as SharedRecipient);
            }
            None => trace!(id = connection.id(), line = %line, "Ignoring client line"),
        }
    }
    Ok(())
}
