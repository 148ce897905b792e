/* src/server/core/rust/src/render.rs */

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;

use bytes::Bytes;
use futures_util::{FutureExt, StreamExt};
use futures_util::stream::FuturesUnordered;
use tokio::sync::{mpsc, watch};

use crate::abort::{AbortHandle, AbortSignal};
use crate::errors::RenderError;
use crate::loader::BoxFuture;
use crate::providers::{App, RenderScope};
use crate::tree::Node;

const EVENT_BUFFER: usize = 16;

/// Client-side helpers for streamed boundaries. `$WR` moves a hidden
/// segment into its placeholder; `$WX` flags a boundary for client render.
pub const REVEAL_RUNTIME: &str = concat!(
  "<script>",
  "$WR=function(b,s){var t=document.getElementById(b),c=document.getElementById(s);",
  "if(!t||!c)return;var p=t.parentNode,n=t.nextSibling;",
  "while(n&&!(n.nodeType===8&&n.data===\"/$\")){var x=n.nextSibling;p.removeChild(n);n=x}",
  "while(c.firstChild)p.insertBefore(c.firstChild,t);p.removeChild(t);if(n)p.removeChild(n);",
  "c.parentNode.removeChild(c)};",
  "$WX=function(b){var t=document.getElementById(b);if(t)t.setAttribute(\"data-client-render\",\"\")};",
  "</script>"
);

#[derive(Debug)]
pub enum RenderEvent {
  ShellReady(Bytes),
  ShellError(RenderError),
  Chunk(Bytes),
  /// Post-shell failure; the boundary stays on its fallback.
  Error(RenderError),
  AllReady,
  Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
  Pending,
  ShellReady,
  ShellError,
  StreamComplete,
  Aborted,
}

impl RenderPhase {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::ShellError | Self::StreamComplete | Self::Aborted)
  }

  fn can_move_to(self, next: RenderPhase) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::ShellReady | Self::ShellError)
        | (Self::ShellReady, Self::StreamComplete | Self::Aborted)
    )
  }
}

/// Guards phase transitions. Once the shell has failed nothing else may be
/// emitted.
struct PhaseMachine {
  tx: watch::Sender<RenderPhase>,
  shell_failed: bool,
}

impl PhaseMachine {
  fn advance(&mut self, next: RenderPhase) -> bool {
    if self.shell_failed {
      return false;
    }
    let current = *self.tx.borrow();
    if !current.can_move_to(next) {
      tracing::debug!(?current, ?next, "ignored render phase transition");
      return false;
    }
    if next == RenderPhase::ShellError {
      self.shell_failed = true;
    }
    self.tx.send_replace(next);
    true
  }
}

/// The consuming side of a render: ordered events plus abort.
#[derive(Debug)]
pub struct RenderHandle {
  events: mpsc::Receiver<RenderEvent>,
  abort: AbortHandle,
  phase: watch::Receiver<RenderPhase>,
}

impl RenderHandle {
  pub async fn next_event(&mut self) -> Option<RenderEvent> {
    self.events.recv().await
  }

  pub fn phase(&self) -> RenderPhase {
    *self.phase.borrow()
  }

  /// Abort the render. No-op once the render has reached a terminal phase.
  pub fn abort(&self) {
    if !self.phase().is_terminal() {
      self.abort.abort();
    }
  }

  pub fn abort_handle(&self) -> AbortHandle {
    self.abort.clone()
  }

  #[cfg(test)]
  pub(crate) fn scripted(events: mpsc::Receiver<RenderEvent>, abort: AbortHandle) -> Self {
    let (_, phase) = watch::channel(RenderPhase::ShellReady);
    Self { events, abort, phase }
  }
}

/// Dropping the consuming side (client gone, response discarded) cancels
/// whatever is still in flight.
impl Drop for RenderHandle {
  fn drop(&mut self) {
    self.abort();
  }
}

/// Start rendering `app` on a background task.
pub fn render(app: App, abort: AbortHandle) -> RenderHandle {
  let (tx, events) = mpsc::channel(EVENT_BUFFER);
  let (phase_tx, phase) = watch::channel(RenderPhase::Pending);
  let machine = PhaseMachine { tx: phase_tx, shell_failed: false };
  tokio::spawn(drive(app, tx, abort.signal(), machine));
  RenderHandle { events, abort, phase }
}

async fn drive(
  app: App,
  tx: mpsc::Sender<RenderEvent>,
  mut signal: AbortSignal,
  mut machine: PhaseMachine,
) {
  let App { root, scope } = app;
  let mut writer = Writer { scope: &scope, next_id: 0, deferred: Vec::new() };

  let shell = if signal.is_aborted() {
    Err(RenderError::Aborted)
  } else {
    let mut out = String::new();
    writer.write(root, &mut out).map(|()| out)
  };

  let shell = match shell {
    Ok(html) => html,
    Err(err) => {
      if machine.advance(RenderPhase::ShellError) {
        tracing::warn!(request_id = %scope.request_id, error = %err, "shell render failed");
        let _ = tx.send(RenderEvent::ShellError(err)).await;
      }
      return;
    }
  };

  if !machine.advance(RenderPhase::ShellReady) {
    return;
  }
  if tx.send(RenderEvent::ShellReady(Bytes::from(shell))).await.is_err() {
    return;
  }

  let mut outstanding = BTreeSet::new();
  let mut inflight = FuturesUnordered::new();
  for (id, content) in writer.deferred.drain(..) {
    outstanding.insert(id);
    inflight.push(settle(id, content));
  }
  let mut runtime_sent = false;

  while !inflight.is_empty() {
    tokio::select! {
      biased;
      () = signal.aborted() => {
        let mut chunk = String::new();
        prelude(&mut chunk, &mut runtime_sent);
        for id in &outstanding {
          chunk.push_str(&format!("<script>$WX(\"B:{id}\")</script>"));
        }
        tracing::warn!(
          request_id = %scope.request_id,
          pending = outstanding.len(),
          "render aborted after shell"
        );
        machine.advance(RenderPhase::Aborted);
        if !outstanding.is_empty() {
          let _ = tx.send(RenderEvent::Chunk(Bytes::from(chunk))).await;
        }
        let _ = tx.send(RenderEvent::Aborted).await;
        return;
      }
      Some((id, result)) = inflight.next() => {
        outstanding.remove(&id);
        let mut chunk = String::new();
        prelude(&mut chunk, &mut runtime_sent);

        let mark = writer.deferred.len();
        let mut segment = String::new();
        let rendered = result.and_then(|node| writer.write(node, &mut segment));
        match rendered {
          Ok(()) => {
            chunk.push_str(&format!("<div hidden id=\"S:{id}\">{segment}</div>"));
            chunk.push_str(&format!("<script>$WR(\"B:{id}\",\"S:{id}\")</script>"));
            for (child, content) in writer.deferred.drain(..) {
              outstanding.insert(child);
              inflight.push(settle(child, content));
            }
          }
          Err(err) => {
            writer.deferred.truncate(mark);
            let err = match err {
              RenderError::Boundary { .. } => err,
              other => RenderError::Boundary { id, message: other.to_string() },
            };
            tracing::warn!(request_id = %scope.request_id, error = %err, "boundary failed, client will render");
            chunk.push_str(&format!("<script>$WX(\"B:{id}\")</script>"));
            if tx.send(RenderEvent::Error(err)).await.is_err() {
              return;
            }
          }
        }
        if tx.send(RenderEvent::Chunk(Bytes::from(chunk))).await.is_err() {
          return;
        }
      }
    }
  }

  machine.advance(RenderPhase::StreamComplete);
  let _ = tx.send(RenderEvent::AllReady).await;
}

/// Resolves one deferred boundary. A panic inside the content future fails
/// only that boundary.
async fn settle(
  id: usize,
  content: BoxFuture<Result<Node, RenderError>>,
) -> (usize, Result<Node, RenderError>) {
  let result = AssertUnwindSafe(content)
    .catch_unwind()
    .await
    .unwrap_or_else(|_| Err(RenderError::Boundary { id, message: "boundary panicked".into() }));
  (id, result)
}

fn prelude(chunk: &mut String, runtime_sent: &mut bool) {
  if !*runtime_sent {
    chunk.push_str(REVEAL_RUNTIME);
    *runtime_sent = true;
  }
}

type Deferred = (usize, BoxFuture<Result<Node, RenderError>>);

/// Serializes nodes to HTML, collecting suspended boundaries as it goes.
struct Writer<'a> {
  scope: &'a RenderScope,
  next_id: usize,
  deferred: Vec<Deferred>,
}

impl Writer<'_> {
  fn write(&mut self, node: Node, out: &mut String) -> Result<(), RenderError> {
    match node {
      Node::Text(s) => out.push_str(&warden_injector::escape_html(&s)),
      Node::Raw(s) => out.push_str(&s),
      Node::Fragment(children) => {
        for child in children {
          self.write(child, out)?;
        }
      }
      Node::Element(el) => {
        let (el, children) = el.into_children();
        el.write_open(out);
        if !el.is_void() {
          for child in children {
            self.write(child, out)?;
          }
        }
        el.write_close(out);
      }
      Node::Component { name, render } => {
        let scope = self.scope;
        let produced = std::panic::catch_unwind(AssertUnwindSafe(move || render(scope)))
          .map_err(|_| RenderError::component(&name, "component panicked"))?;
        let child = produced.map_err(|err| match err {
          RenderError::Component { .. } => err,
          other => RenderError::component(&name, other.to_string()),
        })?;
        self.write(child, out)?;
      }
      Node::Suspense { fallback, content } => {
        let id = self.next_id;
        self.next_id += 1;
        out.push_str(&format!("<template id=\"B:{id}\"></template>"));
        self.write(*fallback, out)?;
        out.push_str("<!--/$-->");
        self.deferred.push((id, content));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::abort::abort_pair;

  fn app(root: Node) -> App {
    App { root, scope: RenderScope::default() }
  }

  async fn collect(handle: &mut RenderHandle) -> Vec<RenderEvent> {
    let mut events = Vec::new();
    while let Some(ev) = handle.next_event().await {
      events.push(ev);
    }
    events
  }

  fn text(bytes: &Bytes) -> &str {
    std::str::from_utf8(bytes).unwrap()
  }

  #[tokio::test]
  async fn shell_then_all_ready() {
    let root = Node::el("main").child(Node::el("h1").text("Audit <logs>")).into();
    let (abort, _) = abort_pair();
    let mut handle = render(app(root), abort);
    let events = collect(&mut handle).await;
    assert!(matches!(&events[..], [RenderEvent::ShellReady(b), RenderEvent::AllReady]
      if text(b) == "<main><h1>Audit &lt;logs&gt;</h1></main>"));
    assert_eq!(handle.phase(), RenderPhase::StreamComplete);
  }

  #[tokio::test]
  async fn shell_error_never_emits_shell_ready() {
    let root = Node::el("main")
      .child(Node::component("ok", |_| Ok(Node::text("fine"))))
      .child(Node::component("broken", |_| Err(RenderError::component("broken", "no data"))))
      .into();
    let (abort, _) = abort_pair();
    let mut handle = render(app(root), abort);
    let events = collect(&mut handle).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], RenderEvent::ShellError(RenderError::Component { component, .. })
      if component == "broken"));
    assert_eq!(handle.phase(), RenderPhase::ShellError);
  }

  #[tokio::test]
  async fn panicking_component_is_a_shell_error() {
    let root = Node::component("boom", |_| {
      let missing: Option<Node> = None;
      Ok(missing.expect("component exploded"))
    });
    let (abort, _) = abort_pair();
    let mut handle = render(app(root), abort);
    assert!(matches!(handle.next_event().await, Some(RenderEvent::ShellError(_))));
    assert!(handle.next_event().await.is_none());
  }

  #[tokio::test]
  async fn suspense_streams_chunks_after_shell() {
    let root = Node::el("section")
      .child(Node::suspense(Node::text("loading"), async { Ok(Node::el("p").text("ready").into()) }))
      .into();
    let (abort, _) = abort_pair();
    let mut handle = render(app(root), abort);
    let events = collect(&mut handle).await;
    let [RenderEvent::ShellReady(shell), RenderEvent::Chunk(chunk), RenderEvent::AllReady] =
      &events[..]
    else {
      panic!("unexpected events: {events:?}");
    };
    assert_eq!(text(shell), "<section><template id=\"B:0\"></template>loading<!--/$--></section>");
    let chunk = text(chunk);
    assert!(chunk.starts_with(REVEAL_RUNTIME));
    assert!(chunk.ends_with(
      "<div hidden id=\"S:0\"><p>ready</p></div><script>$WR(\"B:0\",\"S:0\")</script>"
    ));
  }

  #[tokio::test]
  async fn failed_boundary_is_non_fatal() {
    let root = Node::fragment([
      Node::suspense(Node::text("a…"), async { Err(RenderError::component("chart", "bad series")) }),
      Node::suspense(Node::text("b…"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(Node::text("b"))
      }),
    ]);
    let (abort, _) = abort_pair();
    let mut handle = render(app(root), abort);
    let events = collect(&mut handle).await;
    assert!(matches!(events.first(), Some(RenderEvent::ShellReady(_))));
    assert!(events.iter().any(|e| matches!(e, RenderEvent::Error(RenderError::Boundary { id: 0, .. }))));
    assert!(events.iter().any(|e| matches!(e, RenderEvent::Chunk(c) if text(c).contains("$WX(\"B:0\")"))));
    assert!(matches!(events.last(), Some(RenderEvent::AllReady)));
  }

  #[tokio::test]
  async fn panicking_boundary_is_client_rendered() {
    let root = Node::fragment([
      Node::suspense(Node::text("a…"), async {
        let series: Option<Node> = None;
        Ok(series.expect("chart series missing"))
      }),
      Node::suspense(Node::text("b…"), async { Ok(Node::text("b")) }),
    ]);
    let (abort, _) = abort_pair();
    let mut handle = render(app(root), abort);
    let events = collect(&mut handle).await;
    assert!(matches!(events.first(), Some(RenderEvent::ShellReady(_))));
    assert!(events.iter().any(|e| matches!(e, RenderEvent::Error(RenderError::Boundary { id: 0, .. }))));
    assert!(events.iter().any(|e| matches!(e, RenderEvent::Chunk(c) if text(c).contains("$WX(\"B:0\")"))));
    assert!(events.iter().any(|e| matches!(e, RenderEvent::Chunk(c) if text(c).contains("$WR(\"B:1\",\"S:1\")"))));
    assert!(matches!(events.last(), Some(RenderEvent::AllReady)));
    assert_eq!(handle.phase(), RenderPhase::StreamComplete);
  }

  #[tokio::test]
  async fn nested_boundary_streams_after_its_parent() {
    let root = Node::el("section")
      .child(Node::suspense(Node::text("outer…"), async {
        let inner = Node::suspense(Node::text("inner…"), async { Ok(Node::text("controls")) });
        Ok(Node::el("article").child(inner).into())
      }))
      .into();
    let (abort, _) = abort_pair();
    let mut handle = render(app(root), abort);
    let events = collect(&mut handle).await;
    let [RenderEvent::ShellReady(_), RenderEvent::Chunk(outer), RenderEvent::Chunk(inner), RenderEvent::AllReady] =
      &events[..]
    else {
      panic!("unexpected events: {events:?}");
    };
    let outer = text(outer);
    assert!(outer.contains("<div hidden id=\"S:0\"><article><template id=\"B:1\"></template>inner…<!--/$--></article></div>"));
    assert!(outer.ends_with("<script>$WR(\"B:0\",\"S:0\")</script>"));
    assert_eq!(
      text(inner),
      "<div hidden id=\"S:1\">controls</div><script>$WR(\"B:1\",\"S:1\")</script>"
    );
    assert_eq!(handle.phase(), RenderPhase::StreamComplete);
  }

  #[tokio::test]
  async fn abort_after_shell_marks_pending_for_client() {
    let root = Node::suspense(Node::text("…"), async {
      std::future::pending::<()>().await;
      Ok(Node::empty())
    });
    let (abort, _) = abort_pair();
    let mut handle = render(app(root), abort);
    assert!(matches!(handle.next_event().await, Some(RenderEvent::ShellReady(_))));
    handle.abort();
    let rest = collect(&mut handle).await;
    assert!(matches!(&rest[..], [RenderEvent::Chunk(c), RenderEvent::Aborted]
      if text(c).ends_with("<script>$WX(\"B:0\")</script>")));
    assert_eq!(handle.phase(), RenderPhase::Aborted);
  }

  #[tokio::test]
  async fn abort_before_shell_is_a_shell_error() {
    let (abort, _) = abort_pair();
    abort.abort();
    let mut handle = render(app(Node::text("x")), abort);
    assert!(matches!(handle.next_event().await, Some(RenderEvent::ShellError(RenderError::Aborted))));
  }

  #[tokio::test]
  async fn dropping_handle_cancels_pending_boundaries() {
    let root = Node::suspense(Node::text("…"), async {
      std::future::pending::<()>().await;
      Ok(Node::empty())
    });
    let (abort, _) = abort_pair();
    let watcher = abort.clone();
    let mut handle = render(app(root), abort);
    assert!(matches!(handle.next_event().await, Some(RenderEvent::ShellReady(_))));
    drop(handle);
    assert!(watcher.is_aborted());
  }

  #[tokio::test]
  async fn abort_after_completion_is_noop() {
    let (abort, _) = abort_pair();
    let mut handle = render(app(Node::text("done")), abort);
    let events = collect(&mut handle).await;
    assert!(matches!(events.last(), Some(RenderEvent::AllReady)));
    handle.abort();
    handle.abort_handle().abort();
    assert_eq!(handle.phase(), RenderPhase::StreamComplete);
    assert!(handle.next_event().await.is_none());
  }
}
