/* src/server/adapter/axum/src/assets.rs */

use axum::Router;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, Response};
use tower_http::services::ServeDir;
use tower_http::services::fs::ServeFileSystemResponseBody;
use tower_http::set_header::SetResponseHeader;
use warden_ssr::StaticMount;

/// Nest one `ServeDir` per mount. `Cache-Control` is only attached to
/// successful responses so a missing file is never cached as immutable.
pub(crate) fn mount_static<S>(mut router: Router<S>, mounts: &[StaticMount]) -> Router<S>
where
  S: Clone + Send + Sync + 'static,
{
  for mount in mounts {
    let value = HeaderValue::from_static(mount.cache_control);
    let service = SetResponseHeader::overriding(
      ServeDir::new(&mount.dir),
      CACHE_CONTROL,
      move |res: &Response<ServeFileSystemResponseBody>| {
        res.status().is_success().then(|| value.clone())
      },
    );
    router = router.nest_service(mount.route, service);
  }
  router
}
