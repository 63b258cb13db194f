//! Session byte streams
//!
//! A session owns its stream as a [`BoxedStream`] so the plaintext
//! socket can be swapped for an encrypted one mid-connection.
//! [`TlsUpgrade`] wraps a stream in a server-side TLS session whose
//! handshake runs on first read or write, so a failed handshake shows
//! up as an ordinary I/O error on the session.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::server::TlsStream;
use tokio_rustls::{Accept, TlsAcceptor};

/// Any bidirectional byte stream a session can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Owned, replaceable session transport.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Wrap `stream` so it speaks TLS as the server side.
///
/// No I/O happens here; the handshake is driven by the first
/// operation on the returned stream.
pub fn upgrade<S>(stream: S, acceptor: &TlsAcceptor) -> TlsUpgrade<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    TlsUpgrade {
        state: State::Handshaking(acceptor.accept(stream)),
    }
}

enum State<S> {
    Handshaking(Accept<S>),
    Streaming(TlsStream<S>),
    Failed,
}

/// A stream that completes a TLS handshake lazily.
pub struct TlsUpgrade<S> {
    state: State<S>,
}

impl<S> TlsUpgrade<S> {
    /// Whether the handshake has completed successfully.
    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(self.state, State::Streaming(_))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> TlsUpgrade<S> {
    fn poll_handshake(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let State::Handshaking(accept) = &mut self.state else {
            return Poll::Ready(Ok(()));
        };
        match ready!(Pin::new(accept).poll(cx)) {
            Ok(stream) => {
                self.state = State::Streaming(stream);
                Poll::Ready(Ok(()))
            }
            Err(e) => {
                self.state = State::Failed;
                Poll::Ready(Err(e))
            }
        }
    }

    fn poll_stream(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<Pin<&mut TlsStream<S>>>> {
        ready!(self.poll_handshake(cx))?;
        match &mut self.state {
            State::Streaming(stream) => Poll::Ready(Ok(Pin::new(stream))),
            _ => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "TLS handshake failed",
            ))),
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for TlsUpgrade<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        ready!(self.get_mut().poll_stream(cx))?.poll_read(cx, buf)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncWrite for TlsUpgrade<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        ready!(self.get_mut().poll_stream(cx))?.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.get_mut().poll_stream(cx))?.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.get_mut().poll_stream(cx))?.poll_shutdown(cx)
    }
}

/// Placeholder left in a session while its stream is being replaced.
///
/// Every operation fails with `NotConnected`.
pub(crate) struct Detached;

impl AsyncRead for Detached {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::ErrorKind::NotConnected.into()))
    }
}

impl AsyncWrite for Detached {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::NotConnected.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::ErrorKind::NotConnected.into()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::ErrorKind::NotConnected.into()))
    }
}
