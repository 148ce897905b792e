/* src/server/injector/rust/src/escape.rs */

/// Escape text for use in HTML element content and quoted attribute values.
pub fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for ch in s.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#x27;"),
      c => out.push(c),
    }
  }
  out
}

/// Make serialized JSON safe to embed inside an inline `<script>` element.
///
/// `<` and `>` can only appear inside JSON strings, so replacing them with
/// their `\uXXXX` forms keeps the text valid JSON (and valid JavaScript)
/// while ruling out `</script`, `<!--` and `-->` sequences. `&` is escaped
/// for XHTML parsers, U+2028/U+2029 because they terminate JavaScript
/// string literals in older engines.
pub fn escape_script_json(json: &str) -> String {
  let mut out = String::with_capacity(json.len() + json.len() / 8);
  for ch in json.chars() {
    match ch {
      '<' => out.push_str("\\u003c"),
      '>' => out.push_str("\\u003e"),
      '&' => out.push_str("\\u0026"),
      '\u{2028}' => out.push_str("\\u2028"),
      '\u{2029}' => out.push_str("\\u2029"),
      c => out.push(c),
    }
  }
  out
}
