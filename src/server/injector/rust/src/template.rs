/* src/server/injector/rust/src/template.rs */

/// Mount point the client bundle hydrates into.
pub const DEFAULT_MOUNT_MARKER: &str = r#"<div id="root"></div>"#;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
  #[error("mount marker `{marker}` not found in page template")]
  MissingMarker { marker: String },
  #[error("mount marker `{marker}` appears {count} times in page template, expected exactly once")]
  DuplicateMarker { marker: String, count: usize },
  #[error("mount marker `{marker}` must be an empty element such as <div id=\"root\"></div>")]
  InvalidMarker { marker: String },
}

/// A page template split around its single mount marker.
///
/// `head` is everything before the marker and `tail` everything after it,
/// so `head + marker + tail` is the original template byte for byte. The
/// marker itself is an empty element; rendered markup goes between its
/// opening and closing tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate {
  head: String,
  tail: String,
  mount_open: String,
  mount_close: String,
}

impl PageTemplate {
  pub fn parse(html: &str, marker: &str) -> Result<Self, TemplateError> {
    let (mount_open, mount_close) = split_marker(marker)?;

    let count = html.matches(marker).count();
    match count {
      0 => return Err(TemplateError::MissingMarker { marker: marker.to_string() }),
      1 => {}
      _ => return Err(TemplateError::DuplicateMarker { marker: marker.to_string(), count }),
    }

    let Some((head, tail)) = html.split_once(marker) else {
      return Err(TemplateError::MissingMarker { marker: marker.to_string() });
    };

    Ok(Self {
      head: head.to_string(),
      tail: tail.to_string(),
      mount_open: mount_open.to_string(),
      mount_close: mount_close.to_string(),
    })
  }

  pub fn head(&self) -> &str {
    &self.head
  }

  pub fn tail(&self) -> &str {
    &self.tail
  }

  /// Head fragment followed by the opening tag of the mount element.
  pub fn opening(&self) -> String {
    let mut out = String::with_capacity(self.head.len() + self.mount_open.len());
    out.push_str(&self.head);
    out.push_str(&self.mount_open);
    out
  }

  /// Closing tag of the mount element, the given inline scripts, then the tail.
  pub fn closing(&self, scripts: &str) -> String {
    let mut out =
      String::with_capacity(self.mount_close.len() + scripts.len() + self.tail.len());
    out.push_str(&self.mount_close);
    out.push_str(scripts);
    out.push_str(&self.tail);
    out
  }

  /// The marker as it appeared in the source template.
  pub fn marker(&self) -> String {
    format!("{}{}", self.mount_open, self.mount_close)
  }
}

/// `<div id="root"></div>` -> (`<div id="root">`, `</div>`)
fn split_marker(marker: &str) -> Result<(&str, &str), TemplateError> {
  let invalid = || TemplateError::InvalidMarker { marker: marker.to_string() };
  let close_at = marker.rfind("</").ok_or_else(invalid)?;
  let (open, close) = marker.split_at(close_at);
  if !open.starts_with('<') || !open.ends_with('>') || !close.ends_with('>') {
    return Err(invalid());
  }
  Ok((open, close))
}
