/* demo/console/src/main.rs */

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use warden_console::build_context;
use warden_console::config::{Cli, Launch};
use warden_ssr::RenderMode;
use warden_ssr_axum::{IntoAxumRouter, load_tls, serve};

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  init_tracing();
  let launch = Launch::from(Cli::parse());

  let ctx = build_context(&launch).await.context("failed to prepare render environment")?;
  // TLS termination is a production concern; dev always speaks plain HTTP.
  let tls = match launch.mode {
    RenderMode::Production => load_tls(&launch.server.tls_paths()).await,
    RenderMode::Development => None,
  };

  let addr = launch.addr();
  serve(ctx.into_axum_router(), addr, tls).await.with_context(|| format!("server on {addr} failed"))
}
