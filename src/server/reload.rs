// src/server/reload.rs

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// What connected browsers should do after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadKind {
    /// Re-fetch stylesheets in place.
    Styles,
    /// Reload the page.
    Full,
}

#[derive(Serialize)]
struct ReloadMessage {
    kind: ReloadKind,
}

impl ReloadKind {
    /// SSE payload, e.g. `{"kind":"styles"}`.
    pub fn to_json(self) -> String {
        serde_json::to_string(&ReloadMessage { kind: self })
            .unwrap_or_else(|_| String::from(r#"{"kind":"full"}"#))
    }
}

/// Fan-out of reload notifications to every connected browser.
///
/// Delivery is fire-and-forget: with nobody listening the message is
/// dropped, and a slow client that lags behind skips to the newest message.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadKind>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ReloadHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn notify(&self, kind: ReloadKind) {
        match self.tx.send(kind) {
            Ok(clients) => debug!(?kind, clients, "broadcast reload"),
            Err(_) => debug!(?kind, "no browsers connected; reload dropped"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadKind> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
