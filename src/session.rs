//! Per-connection protocol loop
//!
//! ```text
//!   accept -> banner -> read -> [latency] -> canned response -> handler
//!                        ^                                       |
//!                        +---------------------------------------+
//! ```
//!
//! A session ends when a read fails or returns zero bytes, or when a
//! write fails. Nothing a client sends is treated as an error.

use crate::config::SessionConfig;
use crate::response::{ACK, AUTH_CONTINUE, AUTH_READY, BANNER, Handler};
use crate::transport::{self, AsyncStream, BoxedStream, Detached};
use std::borrow::Cow;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Bytes requested from the stream per read.
pub const READ_BUF_SIZE: usize = 4096;

/// Write `text` to the stream and flush.
///
/// With `verbose`, each non-empty CRLF-separated line is logged as
/// outbound traffic.
///
/// # Errors
///
/// Returns the underlying write or flush error.
pub async fn respond<W>(stream: &mut W, text: &str, verbose: bool) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(text.as_bytes()).await?;
    stream.flush().await?;

    if verbose {
        for line in text.split("\r\n").filter(|line| !line.is_empty()) {
            info!("<- [{line}]");
        }
    }
    Ok(())
}

/// Whether an `AUTH` line asks for a continuation round.
///
/// That is the case when the verb is exactly `AUTH` (any case) and it
/// names a mechanism but carries no initial response. `AUTH` alone,
/// with an initial response, or a longer verb such as `AUTHX` is
/// answered straight away.
#[must_use]
pub fn needs_continuation(line: &str) -> bool {
    let mut words = line.split_ascii_whitespace();
    words
        .next()
        .is_some_and(|verb| verb.eq_ignore_ascii_case("AUTH"))
        && words.next().is_some()
        && words.next().is_none()
}

/// Client input as loggable text, without line terminators, padding
/// or NUL bytes.
fn trim_line(bytes: &[u8]) -> Cow<'_, str> {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => Cow::Borrowed(trim_str(s)),
        Cow::Owned(s) => Cow::Owned(trim_str(&s).to_string()),
    }
}

fn trim_str(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}

/// One client connection.
///
/// Owns its stream exclusively. The stream is swapped in place when
/// `STLS` upgrades the connection.
pub struct Session {
    stream: BoxedStream,
    buf: Box<[u8]>,
    peer: SocketAddr,
    config: Arc<SessionConfig>,
    /// Set once `STLS` has swapped in a TLS stream.
    upgraded: bool,
}

impl Session {
    #[must_use]
    pub fn new<S>(stream: S, peer: SocketAddr, config: Arc<SessionConfig>) -> Self
    where
        S: AsyncStream + 'static,
    {
        Self {
            stream: Box::new(stream),
            buf: vec![0; READ_BUF_SIZE].into_boxed_slice(),
            peer,
            config,
            upgraded: false,
        }
    }

    /// Drive the session until the client goes away.
    ///
    /// The stream is dropped, and the connection released, on return.
    pub async fn run(mut self) {
        info!("New connection from {}", self.peer);

        match self.serve().await {
            Ok(()) => debug!("{} closed the connection", self.peer),
            Err(e) => debug!("Connection from {} ended: {}", self.peer, e),
        }

        info!("Connection from {} closed", self.peer);
    }

    async fn serve(&mut self) -> io::Result<()> {
        self.send(BANNER).await?;

        loop {
            let n = self.stream.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(());
            }

            if self.config.verbose {
                info!("-> [{}]", trim_line(&self.buf[..n]));
            }

            if !self.config.latency.is_zero() {
                tokio::time::sleep(self.config.latency).await;
            }

            self.dispatch(n).await?;
        }
    }

    async fn dispatch(&mut self, n: usize) -> io::Result<()> {
        // A second STLS on an upgraded stream is just another unknown command.
        let entry = self
            .config
            .commands
            .lookup(&self.buf[..n])
            .filter(|entry| !(self.upgraded && entry.handler == Handler::StartTls));

        self.send(entry.map_or(ACK, |entry| entry.response)).await?;

        match entry.map_or(Handler::None, |entry| entry.handler) {
            Handler::None => Ok(()),
            Handler::Auth => self.negotiate_auth(n).await,
            Handler::StartTls => {
                self.start_tls();
                Ok(())
            }
        }
    }

    /// SASL exchange for `AUTH`. Credentials are read and dropped;
    /// every attempt succeeds.
    async fn negotiate_auth(&mut self, n: usize) -> io::Result<()> {
        if needs_continuation(&trim_line(&self.buf[..n])) {
            self.send(AUTH_CONTINUE).await?;

            let n = match self.stream.read(&mut self.buf).await {
                Ok(0) | Err(_) => {
                    debug!("No AUTH payload from {}, abandoning exchange", self.peer);
                    return Ok(());
                }
                Ok(n) => n,
            };

            if self.config.verbose {
                info!("-> [{}]", trim_line(&self.buf[..n]));
            }
        }

        self.send(AUTH_READY).await
    }

    /// Replace the plaintext stream with one that performs a TLS
    /// handshake on its next read or write.
    fn start_tls(&mut self) {
        let Some(acceptor) = &self.config.tls else {
            warn!("STLS from {} but no TLS material is loaded", self.peer);
            return;
        };

        let plain = std::mem::replace(&mut self.stream, Box::new(Detached));
        self.stream = Box::new(transport::upgrade(plain, acceptor));
        self.upgraded = true;
        debug!("Upgrading connection from {} to TLS", self.peer);
    }

    async fn send(&mut self, text: &str) -> io::Result<()> {
        respond(&mut self.stream, text, self.config.verbose).await
    }
}
