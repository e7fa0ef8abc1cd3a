//! Transport: the byte stream to the server (TCP or TLS)

use crate::config::ConnectionConfig;
use rustls::{ClientConfig, RootCertStore, ServerName};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Trait for connection streams (TCP, TLS, or anything a caller supplies)
pub trait ConnectionStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ConnectionStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

type BoxedStream = Box<dyn ConnectionStream>;

/// An open connection
///
/// Reads and writes go through separate halves so the send and receive
/// loops never wait on each other. Closing cancels any pending operation.
/// The timeout can be changed at any time; a read or write in progress
/// picks up the new value immediately.
pub struct Transport {
    reader: Mutex<ReadHalf<BoxedStream>>,
    writer: Mutex<WriteHalf<BoxedStream>>,
    closed: CancellationToken,
    timeout: watch::Sender<Option<Duration>>,
    peer: String,
}

impl Transport {
    /// Wrap an already-established stream
    pub fn new<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: ConnectionStream + 'static,
    {
        let (reader, writer) = tokio::io::split(Box::new(stream) as BoxedStream);
        let (timeout, _) = watch::channel(None);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: CancellationToken::new(),
            timeout,
            peer: peer.into(),
        }
    }

    /// Open a connection as described by `config`
    pub async fn connect(config: &ConnectionConfig) -> io::Result<Self> {
        let timeout = config.timeout();
        let peer = format!("{}:{}", config.host, config.port);

        let stream = with_timeout(timeout, "connect", open_tcp(config)).await?;
        stream.set_nodelay(true)?;

        if !config.tls {
            debug!("Connected to {}", peer);
            let transport = Self::new(stream, peer);
            transport.set_timeout(timeout);
            return Ok(transport);
        }

        let connector = tls_connector()?;
        let server_name = ServerName::try_from(config.host.as_str())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let stream = with_timeout(timeout, "TLS handshake", connector.connect(server_name, stream))
            .await?;

        debug!("Connected to {} over TLS", peer);
        let transport = Self::new(stream, peer);
        transport.set_timeout(timeout);
        Ok(transport)
    }

    /// Read into `buf`
    ///
    /// Returns `None` once the transport has been closed, whether before or
    /// during the read.
    pub async fn read(&self, buf: &mut [u8]) -> Option<io::Result<usize>> {
        let mut reader = tokio::select! {
            _ = self.closed.cancelled() => return None,
            reader = self.reader.lock() => reader,
        };
        let mut timeout = self.timeout.subscribe();
        tokio::select! {
            _ = self.closed.cancelled() => None,
            result = with_live_timeout(&mut timeout, "read", reader.read(buf)) => Some(result),
        }
    }

    /// Write all of `data`
    ///
    /// Returns `None` once the transport has been closed.
    pub async fn write_all(&self, data: &[u8]) -> Option<io::Result<()>> {
        let mut writer = tokio::select! {
            _ = self.closed.cancelled() => return None,
            writer = self.writer.lock() => writer,
        };
        let write = async {
            writer.write_all(data).await?;
            writer.flush().await
        };
        let mut timeout = self.timeout.subscribe();
        tokio::select! {
            _ = self.closed.cancelled() => None,
            result = with_live_timeout(&mut timeout, "write", write) => Some(result),
        }
    }

    /// Timeout applied to each read and write; `None` waits forever
    pub fn timeout(&self) -> Option<Duration> {
        *self.timeout.borrow()
    }

    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.timeout.send_replace(timeout);
    }

    /// Close the connection, waking any pending read or write
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!("Closing connection to {}", self.peer);
            self.closed.cancel();
        }
    }

    /// Resolves once [`close`](Self::close) has been called
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Resolve the host and connect to the first address that accepts
async fn open_tcp(config: &ConnectionConfig) -> io::Result<TcpStream> {
    let mut last_error = None;

    for addr in lookup_host((config.host.as_str(), config.port)).await? {
        match connect_addr(addr, config).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connection to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no usable address for {}:{}", config.host, config.port),
        )
    }))
}

async fn connect_addr(addr: SocketAddr, config: &ConnectionConfig) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    if let Some(source) = config.source_address {
        if source.is_ipv4() != addr.is_ipv4() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("source address {} cannot reach {}", source, addr),
            ));
        }
        socket.bind(SocketAddr::new(source, 0))?;
    }

    socket.connect(addr).await
}

fn tls_connector() -> io::Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs()? {
        if let Err(e) = roots.add(&rustls::Certificate(cert.0)) {
            warn!("Skipping unusable native certificate: {}", e);
        }
    }

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

async fn with_timeout<T, F>(timeout: Option<Duration>, what: &str, future: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout {
        Some(duration) => tokio::time::timeout(duration, future)
            .await
            .unwrap_or_else(|_| Err(timed_out(what, duration))),
        None => future.await,
    }
}

/// Like `with_timeout`, but the limit follows `timeout` as it changes,
/// always measured from when the operation began
async fn with_live_timeout<T, F>(
    timeout: &mut watch::Receiver<Option<Duration>>,
    what: &str,
    future: F,
) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    let started = Instant::now();
    let mut watching = true;
    tokio::pin!(future);

    loop {
        let current = *timeout.borrow_and_update();
        let expired = async move {
            match current {
                Some(duration) => tokio::time::sleep_until(started + duration).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            result = &mut future => return result,
            _ = expired => {
                let duration = current.unwrap_or_default();
                return Err(timed_out(what, duration));
            }
            changed = timeout.changed(), if watching => {
                watching = changed.is_ok();
            }
        }
    }
}

fn timed_out(what: &str, duration: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{} timed out after {:?}", what, duration),
    )
}
