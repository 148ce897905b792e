/* demo/console/src/config.rs */

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use warden_ssr::RenderMode;
use warden_ssr_axum::TlsPaths;

#[derive(Parser)]
#[command(name = "warden-console", about = "Server-rendering tier of the Warden compliance console")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
  /// Render from client sources, re-reading the page template on every request
  Dev {
    #[command(flatten)]
    server: ServerConfig,

    /// Client source directory holding index.html and assets/
    #[arg(long, env = "WARDEN_CLIENT_DIR", default_value = "client")]
    client_dir: PathBuf,
  },
  /// Serve the precompiled client bundle
  Start {
    #[command(flatten)]
    server: ServerConfig,
  },
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
  /// Listen port
  #[arg(short, long, env = "PORT", default_value_t = 4173)]
  pub port: u16,

  /// Bind address (production only, development binds to loopback)
  #[arg(long, env = "HOST", default_value = "0.0.0.0")]
  pub host: IpAddr,

  #[arg(long, env = "TLS_CERT_PATH")]
  pub tls_cert: Option<PathBuf>,

  #[arg(long, env = "TLS_KEY_PATH")]
  pub tls_key: Option<PathBuf>,

  /// Backend API base URL used by server-side data loaders
  #[arg(long, env = "WARDEN_API_URL")]
  pub api_url: Option<String>,

  /// Precompiled client output
  #[arg(long, env = "WARDEN_DIST_DIR", default_value = "dist")]
  pub dist_dir: PathBuf,

  /// Hard deadline for one page render
  #[arg(
    long,
    env = "WARDEN_RENDER_TIMEOUT_MS",
    default_value_t = 10_000,
    value_parser = clap::value_parser!(u64).range(1..)
  )]
  pub render_timeout_ms: u64,

  /// Budget for each data loader's backend call
  #[arg(
    long,
    env = "WARDEN_LOADER_TIMEOUT_MS",
    default_value_t = 3_000,
    value_parser = clap::value_parser!(u64).range(1..)
  )]
  pub loader_timeout_ms: u64,
}

impl ServerConfig {
  pub fn render_deadline(&self) -> Duration {
    Duration::from_millis(self.render_timeout_ms)
  }

  pub fn loader_timeout(&self) -> Duration {
    Duration::from_millis(self.loader_timeout_ms)
  }

  pub fn tls_paths(&self) -> TlsPaths {
    TlsPaths { cert: self.tls_cert.clone(), key: self.tls_key.clone() }
  }
}

/// Everything `main` needs once the command line is parsed.
#[derive(Debug, Clone)]
pub struct Launch {
  pub mode: RenderMode,
  pub server: ServerConfig,
  pub client_dir: PathBuf,
}

impl Launch {
  pub fn addr(&self) -> SocketAddr {
    let host = match self.mode {
      RenderMode::Development => IpAddr::V4(Ipv4Addr::LOCALHOST),
      RenderMode::Production => self.server.host,
    };
    SocketAddr::new(host, self.server.port)
  }
}

impl From<Cli> for Launch {
  fn from(cli: Cli) -> Self {
    match cli.command {
      Command::Dev { server, client_dir } => {
        Self { mode: RenderMode::Development, server, client_dir }
      }
      Command::Start { server } => {
        let client_dir = server.dist_dir.clone();
        Self { mode: RenderMode::Production, server, client_dir }
      }
    }
  }
}
