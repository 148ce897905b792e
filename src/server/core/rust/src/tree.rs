/* src/server/core/rust/src/tree.rs */

use std::fmt;
use std::future::Future;

use crate::errors::RenderError;
use crate::loader::BoxFuture;
use crate::providers::RenderScope;

pub type ComponentFn = Box<dyn FnOnce(&RenderScope) -> Result<Node, RenderError> + Send>;

const VOID_ELEMENTS: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
  "wbr",
];

/// Server-side application tree. Each node is rendered exactly once.
pub enum Node {
  Element(Element),
  /// Escaped on output.
  Text(String),
  /// Written verbatim.
  Raw(String),
  Fragment(Vec<Node>),
  Component {
    name: String,
    render: ComponentFn,
  },
  /// Renders `fallback` in the shell and streams `content` once it resolves.
  Suspense {
    fallback: Box<Node>,
    content: BoxFuture<Result<Node, RenderError>>,
  },
}

impl Node {
  pub fn el(tag: &str) -> Element {
    Element { tag: tag.to_string(), attrs: Vec::new(), children: Vec::new() }
  }

  pub fn text(s: impl Into<String>) -> Self {
    Self::Text(s.into())
  }

  pub fn raw(s: impl Into<String>) -> Self {
    Self::Raw(s.into())
  }

  pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
    Self::Fragment(children.into_iter().collect())
  }

  pub fn empty() -> Self {
    Self::Fragment(Vec::new())
  }

  pub fn component<F>(name: &str, render: F) -> Self
  where
    F: FnOnce(&RenderScope) -> Result<Node, RenderError> + Send + 'static,
  {
    Self::Component { name: name.to_string(), render: Box::new(render) }
  }

  pub fn suspense<Fut>(fallback: Node, content: Fut) -> Self
  where
    Fut: Future<Output = Result<Node, RenderError>> + Send + 'static,
  {
    Self::Suspense { fallback: Box::new(fallback), content: Box::pin(content) }
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Element(el) => el.fmt(f),
      Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
      Self::Raw(s) => f.debug_tuple("Raw").field(s).finish(),
      Self::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
      Self::Component { name, .. } => f.debug_struct("Component").field("name", name).finish(),
      Self::Suspense { fallback, .. } => {
        f.debug_struct("Suspense").field("fallback", fallback).finish_non_exhaustive()
      }
    }
  }
}

#[derive(Debug)]
pub struct Element {
  tag: String,
  attrs: Vec<(String, String)>,
  children: Vec<Node>,
}

impl Element {
  pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
    self.attrs.push((name.to_string(), value.into()));
    self
  }

  pub fn class(self, value: impl Into<String>) -> Self {
    self.attr("class", value)
  }

  pub fn child(mut self, node: impl Into<Node>) -> Self {
    self.children.push(node.into());
    self
  }

  pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
    self.children.extend(nodes);
    self
  }

  pub fn text(self, s: impl Into<String>) -> Self {
    self.child(Node::Text(s.into()))
  }

  pub fn tag(&self) -> &str {
    &self.tag
  }

  pub(crate) fn is_void(&self) -> bool {
    VOID_ELEMENTS.contains(&self.tag.as_str())
  }

  pub(crate) fn write_open(&self, out: &mut String) {
    out.push('<');
    out.push_str(&self.tag);
    for (name, value) in &self.attrs {
      out.push(' ');
      out.push_str(name);
      out.push_str("=\"");
      out.push_str(&warden_injector::escape_html(value));
      out.push('"');
    }
    out.push('>');
  }

  pub(crate) fn write_close(&self, out: &mut String) {
    if !self.is_void() {
      out.push_str("</");
      out.push_str(&self.tag);
      out.push('>');
    }
  }

  pub(crate) fn into_children(self) -> (Self, Vec<Node>) {
    let Self { tag, attrs, children } = self;
    (Self { tag, attrs, children: Vec::new() }, children)
  }
}

impl From<Element> for Node {
  fn from(el: Element) -> Self {
    Node::Element(el)
  }
}

impl From<&str> for Node {
  fn from(s: &str) -> Self {
    Node::Text(s.to_string())
  }
}

impl From<String> for Node {
  fn from(s: String) -> Self {
    Node::Text(s)
  }
}
