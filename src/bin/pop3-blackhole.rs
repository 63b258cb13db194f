#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Decoy POP3 server: answers everything, stores nothing

use clap::Parser;
use pop3_blackhole::{Blackhole, BlackholeConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command-line overrides for settings otherwise read from the
/// environment.
#[derive(Parser)]
#[command(name = "pop3-blackhole")]
#[command(about = "Decoy POP3 server that accepts any command and stores nothing")]
struct Args {
    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// TCP port
    #[arg(long)]
    port: Option<u16>,

    /// Delay before every response, in milliseconds (0..=1000000)
    #[arg(long, allow_hyphen_values = true)]
    latency: Option<i64>,

    /// Log POP3 traffic
    #[arg(long)]
    verbose: bool,

    /// Serve TLS on the selected port (e.g. 995)
    #[arg(long, conflicts_with = "starttls")]
    tls: bool,

    /// Offer STLS to upgrade plaintext connections
    #[arg(long)]
    starttls: bool,

    /// Certificate file (PEM encoded)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Private key file (PEM encoded, defaults to the certificate file)
    #[arg(long)]
    key: Option<PathBuf>,

    /// Number of runtime worker threads
    #[arg(long, default_value = "2")]
    threads: usize,
}

impl Args {
    fn apply(self, config: &mut BlackholeConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(latency) = self.latency {
            config.latency_ms = latency;
        }
        config.verbose |= self.verbose;
        config.serve_tls |= self.tls;
        config.starttls |= self.starttls;
        if self.cert.is_some() {
            config.cert_path = self.cert;
        }
        if self.key.is_some() {
            config.key_path = self.key;
        }
    }
}

fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let threads = args.threads.max(1);

    let mut config = BlackholeConfig::from_env()?;
    args.apply(&mut config);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .enable_all()
        .build()?
        .block_on(async {
            let server = Blackhole::bind(&config).await?;
            server.run().await;
            Ok::<_, anyhow::Error>(())
        })
}
