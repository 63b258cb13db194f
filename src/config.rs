//! Server configuration
//!
//! [`BlackholeConfig`] is the plain, user-facing form (environment
//! variables, CLI flags). [`SessionConfig`] is the resolved runtime
//! form shared read-only by every session.

use crate::error::{Error, Result};
use crate::response::ResponseTable;
use crate::tls;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio_rustls::TlsAcceptor;

/// Largest artificial latency accepted, in milliseconds.
pub const MAX_LATENCY_MS: u64 = 1_000_000;

/// Listening and behaviour settings for the decoy server
#[derive(Debug, Clone)]
pub struct BlackholeConfig {
    pub host: String,
    pub port: u16,
    /// Requested per-response delay in milliseconds. Out-of-range
    /// values are treated as zero, see [`clamp_latency`].
    pub latency_ms: i64,
    /// Log every inbound and outbound protocol line.
    pub verbose: bool,
    /// Require a TLS handshake on every accepted connection.
    pub serve_tls: bool,
    /// Offer in-protocol upgrade through `STLS`.
    pub starttls: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl Default for BlackholeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 110,
            latency_ms: 0,
            verbose: false,
            serve_tls: false,
            starttls: false,
            cert_path: None,
            key_path: None,
        }
    }
}

impl BlackholeConfig {
    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `POP3_HOST` (default: `0.0.0.0`)
    /// - `POP3_PORT` (default: `110`)
    /// - `POP3_LATENCY_MS` (default: `0`)
    /// - `POP3_VERBOSE`, `POP3_TLS`, `POP3_STARTTLS` (default: `false`)
    /// - `POP3_CERT`, `POP3_KEY` (PEM files, default: unset)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            host: env::var("POP3_HOST").unwrap_or(defaults.host),
            port: parse_var("POP3_PORT")?.unwrap_or(defaults.port),
            latency_ms: parse_var("POP3_LATENCY_MS")?.unwrap_or(defaults.latency_ms),
            verbose: parse_var("POP3_VERBOSE")?.unwrap_or(defaults.verbose),
            serve_tls: parse_var("POP3_TLS")?.unwrap_or(defaults.serve_tls),
            starttls: parse_var("POP3_STARTTLS")?.unwrap_or(defaults.starttls),
            cert_path: env::var_os("POP3_CERT").map(PathBuf::from),
            key_path: env::var_os("POP3_KEY").map(PathBuf::from),
        })
    }

    /// The `host:port` string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The effective artificial latency.
    #[must_use]
    pub fn latency(&self) -> Duration {
        clamp_latency(self.latency_ms)
    }

    /// Certificate and key paths, if TLS material was configured.
    ///
    /// The key defaults to the certificate file, for PEM bundles that
    /// carry both.
    #[must_use]
    pub fn tls_paths(&self) -> Option<(PathBuf, PathBuf)> {
        let cert = self.cert_path.clone()?;
        let key = self.key_path.clone().unwrap_or_else(|| cert.clone());
        Some((cert, key))
    }

    /// Check flag combinations that cannot be served.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if both TLS modes are requested, or if
    /// either is requested without a certificate.
    pub fn validate(&self) -> Result<()> {
        if self.serve_tls && self.starttls {
            return Err(Error::Config(
                "serve_tls and starttls are mutually exclusive".into(),
            ));
        }
        if (self.serve_tls || self.starttls) && self.cert_path.is_none() {
            return Err(Error::Config("TLS requested but no certificate set".into()));
        }
        Ok(())
    }
}

/// Map a requested latency to the delay actually applied.
///
/// Anything outside `0..=MAX_LATENCY_MS` disables the delay.
#[must_use]
pub fn clamp_latency(ms: i64) -> Duration {
    match u64::try_from(ms) {
        Ok(ms) if ms <= MAX_LATENCY_MS => Duration::from_millis(ms),
        _ => Duration::ZERO,
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Resolved settings shared by all sessions
///
/// Built once at startup and never mutated afterwards, so sessions
/// read it through an `Arc` without locking.
#[derive(Clone)]
pub struct SessionConfig {
    pub latency: Duration,
    pub verbose: bool,
    /// Present whenever certificate material was loaded.
    pub tls: Option<TlsAcceptor>,
    pub commands: ResponseTable,
}

impl SessionConfig {
    /// Resolve a [`BlackholeConfig`], loading TLS material from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is inconsistent or the
    /// certificate/key files cannot be loaded.
    pub fn from_config(config: &BlackholeConfig) -> Result<Self> {
        config.validate()?;

        let tls = match config.tls_paths() {
            Some((cert, key)) => Some(tls::load_acceptor(&cert, &key)?),
            None => None,
        };

        Ok(Self {
            latency: config.latency(),
            verbose: config.verbose,
            tls,
            commands: if config.starttls {
                ResponseTable::with_starttls()
            } else {
                ResponseTable::standard()
            },
        })
    }

    /// Plaintext settings with the standard table and no delay.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            latency: Duration::ZERO,
            verbose: false,
            tls: None,
            commands: ResponseTable::standard(),
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("latency", &self.latency)
            .field("verbose", &self.verbose)
            .field("tls", &self.tls.is_some())
            .field("commands", &self.commands)
            .finish()
    }
}
