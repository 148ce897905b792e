/* src/server/injector/rust/src/lib.rs */

//! Pure string helpers for the Warden server-rendering tier: splitting the
//! page template around its mount point, escaping text for HTML, and
//! serializing the data cache into an inline state script.

pub mod escape;
pub mod script;
pub mod template;

pub use escape::{escape_html, escape_script_json};
pub use script::{DEFAULT_STATE_GLOBAL, extract_state, state_script};
pub use template::{DEFAULT_MOUNT_MARKER, PageTemplate, TemplateError};
