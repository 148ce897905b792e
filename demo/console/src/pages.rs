/* demo/console/src/pages.rs */

use serde::Deserialize;
use serde::de::DeserializeOwned;
use warden_ssr::{CacheKey, Node, PageRegistry, RenderError, RenderScope, Theme};

use crate::loaders::{
  AUDIT_LOGS, CURRENT_USER, MODULE_DETAIL, SUPPORT_SETTINGS, TENANT_MODULES, audit_params,
  module_params, parse_page,
};

#[derive(Debug, Deserialize)]
struct CurrentUser {
  name: String,
  #[serde(default)]
  role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupportSettings {
  contact_email: String,
  #[serde(default)]
  phone: Option<String>,
  #[serde(default)]
  hours: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Module {
  id: String,
  title: String,
  #[serde(default)]
  status: Option<String>,
  #[serde(default)]
  controls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AuditPage {
  entries: Vec<AuditEntry>,
  #[serde(default)]
  has_more: bool,
}

#[derive(Debug, Deserialize)]
struct AuditEntry {
  at: String,
  actor: String,
  action: String,
}

/// Typed read of a resolved cache entry. A payload that does not fit the
/// shape reads as absent and the page renders its empty state.
fn read<T: DeserializeOwned>(scope: &RenderScope, key: &str) -> Option<T> {
  let value = scope.data(key)?;
  match serde_json::from_value(value.clone()) {
    Ok(parsed) => Some(parsed),
    Err(err) => {
      tracing::warn!(request_id = %scope.request_id, key, %err, "unexpected loader payload");
      None
    }
  }
}

fn link(href: &str, label: &str) -> Node {
  Node::el("a").attr("href", href).text(label).into()
}

fn notice(message: &str) -> Node {
  Node::el("p").class("notice").text(message).into()
}

/// Code-split section: the fallback goes out with the shell and the view
/// streams in once its chunk is ready.
fn deferred(label: &str, view: Node) -> Node {
  let fallback = Node::el("div").class("skeleton").attr("aria-busy", "true").text(label);
  Node::suspense(fallback.into(), async move {
    tokio::task::yield_now().await;
    Ok(view)
  })
}

fn console_layout(scope: &RenderScope, outlet: Node) -> Result<Node, RenderError> {
  let theme = match scope.theme {
    Theme::Light => "console theme-light",
    Theme::Dark => "console theme-dark",
  };
  let account = match read::<CurrentUser>(scope, CURRENT_USER) {
    Some(user) => {
      let label = match user.role {
        Some(role) => format!("{} ({role})", user.name),
        None => user.name,
      };
      Node::el("span").class("account").text(label).into()
    }
    None if scope.session.is_authenticated() => Node::el("span").class("account").text("Account").into(),
    None => link("/login", "Sign in"),
  };
  let tenant = scope.session.tenant().map_or_else(Node::empty, |t| {
    Node::el("span").class("tenant").attr("data-tenant", t).text(t).into()
  });

  let nav = Node::el("nav").class("console-nav").children([
    link("/dashboard", "Dashboard"),
    link("/modules", "Modules"),
    link("/audit-logs", "Audit logs"),
    link("/settings/support", "Support"),
    link("/billing", "Billing"),
  ]);
  Ok(
    Node::el("div")
      .class(theme)
      .child(Node::el("header").children([nav.into(), tenant, account]))
      .child(Node::el("main").child(outlet))
      .into(),
  )
}

fn login(scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  let next = scope.query_param("next").unwrap_or("/dashboard");
  let form = Node::el("form")
    .attr("method", "post")
    .attr("action", "/auth/login")
    .attr("data-next", next)
    .child(Node::el("input").attr("type", "email").attr("name", "email"))
    .child(Node::el("input").attr("type", "password").attr("name", "password"))
    .child(Node::el("button").attr("type", "submit").text("Sign in"));
  Ok(Node::el("section").class("login").child(Node::el("h1").text("Sign in")).child(form).into())
}

fn home(_scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  Ok(
    Node::el("section")
      .class("home")
      .child(Node::el("h1").text("Warden"))
      .child(Node::el("p").text("Compliance and security operations for your organisation."))
      .child(link("/dashboard", "Open dashboard"))
      .into(),
  )
}

fn support_panel(scope: &RenderScope) -> Node {
  if let Some(settings) = read::<SupportSettings>(scope, SUPPORT_SETTINGS) {
    let mut panel = Node::el("dl")
      .class("support")
      .child(Node::el("dt").text("Email"))
      .child(Node::el("dd").text(settings.contact_email));
    if let Some(phone) = settings.phone {
      panel = panel.child(Node::el("dt").text("Phone")).child(Node::el("dd").text(phone));
    }
    if let Some(hours) = settings.hours {
      panel = panel.child(Node::el("dt").text("Hours")).child(Node::el("dd").text(hours));
    }
    return panel.into();
  }
  if scope.data_error(SUPPORT_SETTINGS).is_some() {
    return notice("Support contact details are unavailable right now.");
  }
  Node::empty()
}

fn dashboard(scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  let cards = Node::el("div").class("cards").children([
    Node::el("article").class("card").text("Open findings").into(),
    Node::el("article").class("card").text("Controls passing").into(),
    Node::el("article").class("card").text("Upcoming audits").into(),
  ]);
  Ok(
    Node::el("section")
      .class("dashboard")
      .child(Node::el("h1").text("Compliance dashboard"))
      .child(cards)
      .child(Node::el("aside").child(Node::el("h2").text("Need help?")).child(support_panel(scope)))
      .into(),
  )
}

fn modules_layout(_scope: &RenderScope, outlet: Node) -> Result<Node, RenderError> {
  Ok(Node::el("section").class("modules").child(Node::el("h1").text("Modules")).child(outlet).into())
}

fn module_list(scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  let Some(modules) = read::<Vec<Module>>(scope, TENANT_MODULES) else {
    return Ok(notice("No modules to show."));
  };
  let items = modules.into_iter().map(|m| {
    let href = format!("/modules/{}", m.id);
    Node::from(Node::el("li").child(link(&href, &m.title)))
  });
  Ok(Node::el("ul").class("module-list").children(items).into())
}

fn module_detail(scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  let key = CacheKey::with_params(MODULE_DETAIL, &module_params(scope.param("id")));
  let Some(module) = read::<Module>(scope, key.as_str()) else {
    return Ok(notice("Module unavailable."));
  };
  let controls = module.controls.into_iter().map(|c| Node::from(Node::el("li").text(c)));
  let body = Node::el("article")
    .class("module-detail")
    .attr("data-status", module.status.as_deref().unwrap_or("unknown"))
    .child(Node::el("h2").text(module.title))
    .child(Node::el("ul").class("controls").children(controls));
  Ok(deferred("Loading controls", body.into()))
}

fn audit_logs(scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  let page = parse_page(scope.query_param("page"));
  let key = CacheKey::with_params(AUDIT_LOGS, &audit_params(page));
  let heading = Node::el("h1").text("Audit logs");
  let Some(log) = read::<AuditPage>(scope, key.as_str()) else {
    return Ok(Node::fragment([heading.into(), notice("Audit history is unavailable.")]));
  };

  let rows = log.entries.into_iter().map(|e| {
    let row = Node::el("tr")
      .child(Node::el("td").text(e.at))
      .child(Node::el("td").text(e.actor))
      .child(Node::el("td").text(e.action));
    Node::from(row)
  });
  let table = Node::el("table").class("audit-log").child(Node::el("tbody").children(rows));
  let more = if log.has_more {
    link(&format!("/audit-logs?page={}", page + 1), "Older entries")
  } else {
    Node::empty()
  };
  Ok(Node::fragment([heading.into(), deferred("Loading audit history", table.into()), more]))
}

fn support_settings(scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  Ok(
    Node::el("section")
      .class("support-settings")
      .child(Node::el("h1").text("Support settings"))
      .child(support_panel(scope))
      .into(),
  )
}

fn billing(_scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  let view = Node::el("div").class("billing-plans").child(Node::el("p").text("Plan and invoices"));
  Ok(
    Node::el("section")
      .class("billing")
      .child(Node::el("h1").text("Billing"))
      .child(deferred("Loading billing", view.into()))
      .into(),
  )
}

fn not_found(_scope: &RenderScope, _outlet: Node) -> Result<Node, RenderError> {
  Ok(
    Node::el("section")
      .class("not-found")
      .child(Node::el("h1").text("Page not found"))
      .child(link("/", "Back to the console"))
      .into(),
  )
}

pub fn registry() -> PageRegistry {
  PageRegistry::new()
    .page("console-layout", console_layout)
    .page("login", login)
    .page("home", home)
    .page("dashboard", dashboard)
    .page("modules-layout", modules_layout)
    .page("module-list", module_list)
    .page("module-detail", module_detail)
    .page("audit-logs", audit_logs)
    .page("support-settings", support_settings)
    .page("billing", billing)
    .not_found(not_found)
}
