//! Decoy POP3 server
//!
//! Accepts connections, greets like a real POP3 server and answers
//! every command with a canned positive response. Nothing is stored
//! and no credential is ever checked: `AUTH` always succeeds and the
//! mailbox is always empty.
//!
//! Connections can be served plaintext, wrapped in TLS from the first
//! byte, or upgraded in-protocol through `STLS`. An artificial delay
//! can be added before every response.
//!
//! ```no_run
//! use pop3_blackhole::{Blackhole, BlackholeConfig};
//!
//! # async fn start() -> pop3_blackhole::Result<()> {
//! let config = BlackholeConfig::from_env()?;
//! Blackhole::bind(&config).await?.run().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod response;
mod server;
mod session;
mod tls;
mod transport;

pub use config::{BlackholeConfig, MAX_LATENCY_MS, SessionConfig, clamp_latency};
pub use error::{Error, Result};
pub use response::{
    ACK, AUTH_CONTINUE, AUTH_READY, BANNER, CommandEntry, Handler, PREFIX_LEN, ResponseTable,
};
pub use server::{Blackhole, Listener, TlsListener, serve};
pub use session::{READ_BUF_SIZE, Session, needs_continuation, respond};
pub use tls::load_acceptor;
pub use transport::{AsyncStream, BoxedStream, TlsUpgrade, upgrade};
