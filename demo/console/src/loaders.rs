/* demo/console/src/loaders.rs */

use serde_json::{Value, json};
use warden_ssr::{BackendClient, LoaderContext, LoaderDef, LoaderError, LoaderRegistry, RequestInfo};

pub const CURRENT_USER: &str = "current-user";
pub const SUPPORT_SETTINGS: &str = "support-settings";
pub const TENANT_MODULES: &str = "tenant-modules";
pub const MODULE_DETAIL: &str = "module-detail";
pub const AUDIT_LOGS: &str = "audit-logs";

fn has_token(info: &RequestInfo) -> bool {
  info.header("authorization").is_some_and(|v| !v.trim().is_empty())
}

/// Page number from `?page=N`, defaulting to the first page.
fn audit_page(info: &RequestInfo) -> u64 {
  parse_page(info.query_param("page"))
}

pub(crate) fn parse_page(raw: Option<&str>) -> u64 {
  raw.and_then(|v| v.parse().ok()).filter(|page| *page > 0).unwrap_or(1)
}

/// Cache-key parameters shared by the loaders and the pages reading them.
pub fn module_params(id: Option<&str>) -> Value {
  json!({ "id": id })
}

pub fn audit_params(page: u64) -> Value {
  json!({ "page": page })
}

fn module_id(ctx: &LoaderContext) -> Result<&str, LoaderError> {
  let id = ctx.route_params.get("id").map(String::as_str).unwrap_or_default();
  let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if valid { Ok(id) } else { Err(LoaderError::Failed(format!("invalid module id {id:?}"))) }
}

/// Every server-side prefetch the console performs. Each loader is one
/// backend GET on behalf of the signed-in user; anonymous requests skip
/// them and let the client redirect to the login page.
pub fn registry(backend: BackendClient) -> LoaderRegistry {
  LoaderRegistry::new(backend)
    .loader(
      LoaderDef::new(CURRENT_USER, |ctx| async move { ctx.get_json("/auth/me").await })
        .when(|req| req.hinted(CURRENT_USER) && has_token(req.info)),
    )
    .loader(
      LoaderDef::new(SUPPORT_SETTINGS, |ctx| async move {
        ctx.get_json("/settings/support").await
      })
      .when(|req| req.hinted(SUPPORT_SETTINGS) && has_token(req.info)),
    )
    .loader(
      LoaderDef::new(TENANT_MODULES, |ctx| async move { ctx.get_json("/modules").await })
        .when(|req| req.hinted(TENANT_MODULES) && has_token(req.info)),
    )
    .loader(
      LoaderDef::new(MODULE_DETAIL, |ctx| async move {
        let path = format!("/modules/{}", module_id(&ctx)?);
        ctx.get_json(&path).await
      })
      .when(|req| req.hinted(MODULE_DETAIL) && has_token(req.info))
      .keyed(|req| module_params(req.param("id"))),
    )
    .loader(
      LoaderDef::new(AUDIT_LOGS, |ctx| async move {
        let page = ctx.params["page"].as_u64().unwrap_or(1);
        ctx.get_json(&format!("/audit-logs?page={page}")).await
      })
      .when(|req| req.hinted(AUDIT_LOGS) && has_token(req.info))
      .keyed(|req| audit_params(audit_page(req.info))),
    )
}
