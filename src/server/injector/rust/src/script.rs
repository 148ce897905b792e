/* src/server/injector/rust/src/script.rs */

use serde_json::Value;

use crate::escape::escape_script_json;

/// Global the client data-cache provider rehydrates from (and then deletes).
pub const DEFAULT_STATE_GLOBAL: &str = "__WARDEN_STATE__";

/// Build the inline script that hands the dehydrated data cache to the client.
pub fn state_script(global: &str, snapshot: &Value) -> String {
  let json = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string());
  format!("<script>window.{global}={};</script>", escape_script_json(&json))
}

/// Recover the JSON payload from a script produced by [`state_script`].
pub fn extract_state(html: &str, global: &str) -> Option<Value> {
  let prefix = format!("<script>window.{global}=");
  let start = html.find(&prefix)? + prefix.len();
  let end = start + html[start..].find(";</script>")?;
  serde_json::from_str(&html[start..end]).ok()
}
