//! Listener and accept loop
//!
//! One endpoint is bound per process, either plaintext or with every
//! connection wrapped in TLS before the banner. Each accepted
//! connection gets its own task; a failed accept is logged and the
//! loop carries on.

use crate::config::{BlackholeConfig, SessionConfig};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::{self, BoxedStream};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

/// Source of incoming connections.
pub trait Listener: Send {
    /// Wait for the next connection.
    fn accept(&mut self) -> impl Future<Output = io::Result<(BoxedStream, SocketAddr)>> + Send;
}

impl Listener for TcpListener {
    async fn accept(&mut self) -> io::Result<(BoxedStream, SocketAddr)> {
        let (stream, peer) = Self::accept(self).await?;
        Ok((Box::new(stream), peer))
    }
}

/// Wraps every connection from `L` in a server-side TLS session.
///
/// The handshake happens on the session's first write (the banner),
/// so a client that fails it only ends its own session.
pub struct TlsListener<L> {
    inner: L,
    acceptor: TlsAcceptor,
}

impl<L: Listener> TlsListener<L> {
    pub const fn new(inner: L, acceptor: TlsAcceptor) -> Self {
        Self { inner, acceptor }
    }
}

impl<L: Listener> Listener for TlsListener<L> {
    async fn accept(&mut self) -> io::Result<(BoxedStream, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        Ok((Box::new(transport::upgrade(stream, &self.acceptor)), peer))
    }
}

/// Accept connections forever, one [`Session`] task each.
pub async fn serve<L: Listener>(mut listener: L, config: Arc<SessionConfig>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let session = Session::new(stream, peer, Arc::clone(&config));
                tokio::spawn(session.run());
            }
            Err(e) => warn!("Accept failed: {}", e),
        }
    }
}

/// A bound decoy POP3 server
pub struct Blackhole {
    listener: TcpListener,
    config: Arc<SessionConfig>,
    serve_tls: bool,
}

impl Blackhole {
    /// Resolve `config` and bind its listening address.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the TLS
    /// material cannot be loaded, or the address cannot be bound.
    pub async fn bind(config: &BlackholeConfig) -> Result<Self> {
        let settings = SessionConfig::from_config(config)?;
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {addr}: {e}")))?;

        info!(
            "POP3 blackhole listening on {} ({})",
            listener.local_addr()?,
            if config.serve_tls {
                "TLS"
            } else if config.starttls {
                "plaintext, STLS"
            } else {
                "plaintext"
            }
        );

        Ok(Self {
            listener,
            config: Arc::new(settings),
            serve_tls: config.serve_tls,
        })
    }

    /// The bound address, useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections until the process exits.
    pub async fn run(self) {
        match (self.serve_tls, self.config.tls.clone()) {
            (true, Some(acceptor)) => {
                serve(TlsListener::new(self.listener, acceptor), self.config).await;
            }
            _ => serve(self.listener, self.config).await,
        }
    }
}
