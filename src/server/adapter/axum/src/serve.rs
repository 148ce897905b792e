/* src/server/adapter/axum/src/serve.rs */

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::signal;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct TlsPaths {
  pub cert: Option<PathBuf>,
  pub key: Option<PathBuf>,
}

async fn readable(path: &Path) -> bool {
  tokio::fs::File::open(path).await.is_ok()
}

/// TLS config when both files are configured and readable. Anything less
/// falls back to plain HTTP with a warning.
pub async fn load_tls(paths: &TlsPaths) -> Option<RustlsConfig> {
  let (cert, key) = match (&paths.cert, &paths.key) {
    (Some(cert), Some(key)) => (cert, key),
    (None, None) => return None,
    _ => {
      tracing::warn!("only one of TLS_CERT_PATH / TLS_KEY_PATH is set, serving plain HTTP");
      return None;
    }
  };
  if !readable(cert).await || !readable(key).await {
    tracing::warn!(cert = %cert.display(), key = %key.display(), "TLS files unreadable, serving plain HTTP");
    return None;
  }
  match RustlsConfig::from_pem_file(cert, key).await {
    Ok(config) => Some(config),
    Err(err) => {
      tracing::warn!(%err, "invalid TLS certificate or key, serving plain HTTP");
      None
    }
  }
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(err) = signal::ctrl_c().await {
      tracing::error!(%err, "failed to listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(err) => {
        tracing::error!(%err, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {},
    () = terminate => {},
  }
  tracing::info!("shutdown signal received, draining connections");
}

/// Serve `router` until ctrl-c or SIGTERM, over TLS when `tls` is set.
pub async fn serve(router: Router, addr: SocketAddr, tls: Option<RustlsConfig>) -> std::io::Result<()> {
  match tls {
    Some(config) => {
      let handle = axum_server::Handle::new();
      let shutdown = handle.clone();
      tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
      });
      tracing::info!(%addr, "listening on https://{addr}");
      axum_server::bind_rustls(addr, config).handle(handle).serve(router.into_make_service()).await
    }
    None => {
      let listener = tokio::net::TcpListener::bind(addr).await?;
      let local = listener.local_addr()?;
      tracing::info!(addr = %local, "listening on http://{local}");
      axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn no_paths_means_plain_http() {
    assert!(load_tls(&TlsPaths::default()).await.is_none());
  }

  #[tokio::test]
  async fn half_configured_falls_back() {
    let paths = TlsPaths { cert: Some("cert.pem".into()), key: None };
    assert!(load_tls(&paths).await.is_none());
  }

  #[tokio::test]
  async fn unreadable_files_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let paths = TlsPaths { cert: Some(dir.path().join("missing.pem")), key: Some(dir.path().join("k.pem")) };
    assert!(load_tls(&paths).await.is_none());
  }

  #[tokio::test]
  async fn self_signed_pair_enables_tls() {
    let dir = tempfile::tempdir().unwrap();
    let cert = dir.path().join("cert.pem");
    let key = dir.path().join("key.pem");
    let signed = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    std::fs::write(&cert, signed.cert.pem()).unwrap();
    std::fs::write(&key, signed.key_pair.serialize_pem()).unwrap();
    assert!(load_tls(&TlsPaths { cert: Some(cert), key: Some(key) }).await.is_some());
  }

  #[tokio::test]
  async fn garbage_pem_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let cert = dir.path().join("cert.pem");
    let key = dir.path().join("key.pem");
    std::fs::write(&cert, "not a certificate").unwrap();
    std::fs::write(&key, "not a key").unwrap();
    assert!(load_tls(&TlsPaths { cert: Some(cert), key: Some(key) }).await.is_none());
  }
}
