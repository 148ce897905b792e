/* demo/console/src/routes.rs */

use warden_ssr::{RouteDef, RouteTable};

/// The console's page tree. Loader hints name entries in `loaders::registry`.
pub fn table() -> RouteTable {
  RouteTable::new(vec![
    RouteDef::new("/login", "login"),
    RouteDef::new("/", "console-layout").loaders(["current-user"]).children(vec![
      RouteDef::index("home"),
      RouteDef::new("dashboard", "dashboard").loaders(["support-settings"]),
      RouteDef::new("modules", "modules-layout").children(vec![
        RouteDef::index("module-list").loaders(["tenant-modules"]),
        RouteDef::new("{id}", "module-detail").loaders(["module-detail"]),
      ]),
      RouteDef::new("audit-logs", "audit-logs").loaders(["audit-logs"]),
      RouteDef::new("settings/support", "support-settings").loaders(["support-settings"]),
      RouteDef::new("billing", "billing"),
    ]),
  ])
}
