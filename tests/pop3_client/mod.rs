//! Minimal POP3 test client and server harness
//!
//! Starts a [`Blackhole`] on `127.0.0.1:0` and talks to it over plain
//! TCP, implicit TLS, or `STLS`:
//!
//! ```text
//!   connect -> banner -> command/response ... -> [STLS -> handshake] -> ...
//! ```
//!
//! Certificates are generated per test with `rcgen` and written to
//! temporary PEM files, so the server loads them the same way it
//! would in production.

#![allow(dead_code)]

use pop3_blackhole::{Blackhole, BlackholeConfig};
use rcgen::generate_simple_self_signed;
use rustls::pki_types::ServerName;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

/// A blackhole running in a background task.
pub struct TestServer {
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Bind on an ephemeral localhost port and start serving.
    pub async fn start(config: BlackholeConfig) -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let config = BlackholeConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..config
        };
        let server = Blackhole::bind(&config).await.expect("bind blackhole");
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.run());

        Self {
            addr,
            handle,
        }
    }

    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Self-signed certificate and key written to PEM files.
///
/// The files live as long as this value.
pub struct TestCert {
    pub cert: NamedTempFile,
    pub key: NamedTempFile,
}

impl TestCert {
    pub fn generate() -> Self {
        let generated = generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("generate self-signed cert");

        let mut cert = NamedTempFile::new().unwrap();
        cert.write_all(generated.cert.pem().as_bytes()).unwrap();
        let mut key = NamedTempFile::new().unwrap();
        key.write_all(generated.key_pair.serialize_pem().as_bytes())
            .unwrap();

        Self { cert, key }
    }

    /// Base configuration pointing at these files.
    pub fn config(&self) -> BlackholeConfig {
        BlackholeConfig {
            cert_path: Some(self.cert.path().to_path_buf()),
            key_path: Some(self.key.path().to_path_buf()),
            ..BlackholeConfig::default()
        }
    }
}

/// Line-oriented client over any stream.
pub struct Pop3Client<S> {
    stream: BufReader<S>,
}

impl Pop3Client<TcpStream> {
    /// Connect over plain TCP and return the client with the banner.
    pub async fn connect(addr: SocketAddr) -> (Self, String) {
        let tcp = TcpStream::connect(addr).await.expect("connect");
        let mut client = Self {
            stream: BufReader::new(tcp),
        };
        let banner = client.read_line().await;
        (client, banner)
    }

    /// Send `STLS` and hand the socket to a TLS client.
    pub async fn starttls(mut self) -> (Pop3Client<TlsStream<TcpStream>>, String) {
        let reply = self.command("STLS").await;
        let tls = tls_connect(self.stream.into_inner()).await;
        (
            Pop3Client {
                stream: BufReader::new(tls),
            },
            reply,
        )
    }
}

impl Pop3Client<TlsStream<TcpStream>> {
    /// Connect with TLS from the first byte.
    pub async fn connect_tls(addr: SocketAddr) -> (Self, String) {
        let tcp = TcpStream::connect(addr).await.expect("connect");
        let mut client = Self {
            stream: BufReader::new(tls_connect(tcp).await),
        };
        let banner = client.read_line().await;
        (client, banner)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pop3Client<S> {
    /// Read one CRLF-terminated line, terminator included.
    pub async fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.stream.read_line(&mut line).await.expect("read line");
        line
    }

    /// Read lines up to and including the `.` terminator.
    pub async fn read_multiline(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await;
            assert!(!line.is_empty(), "connection closed mid-response");
            let done = line == ".\r\n";
            lines.push(line);
            if done {
                return lines;
            }
        }
    }

    /// Write `line` followed by CRLF.
    pub async fn send(&mut self, line: &str) {
        let stream = self.stream.get_mut();
        stream
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("write");
        stream.flush().await.expect("flush");
    }

    /// Send a command and return its single-line reply.
    pub async fn command(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_line().await
    }
}

async fn tls_connect(tcp: TcpStream) -> TlsStream<TcpStream> {
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    let name = ServerName::try_from("localhost").unwrap();

    TlsConnector::from(Arc::new(config))
        .connect(name, tcp)
        .await
        .expect("TLS handshake")
}

/// Accepts the server's self-signed test certificate.
#[derive(Debug)]
struct AcceptAnyCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
