//! Transcript accumulator — the rendered conversation text.
//!
//! Appends are broadcast so WebSocket clients can render incrementally.
//! The reset epoch lives under the same lock as the text: a writer holding
//! a stale epoch can never append after `reset` has returned.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Change notifications for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEvent {
    #[serde(rename = "append")]
    Appended { text: String },
    Cleared,
}

#[derive(Debug, Default)]
struct Inner {
    text: String,
    epoch: u64,
}

/// Append-only text buffer, emptied only by `reset`.
pub struct Transcript {
    inner: Mutex<Inner>,
    tx: broadcast::Sender<TranscriptEvent>,
}

impl Transcript {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to appends and clears.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.tx.subscribe()
    }

    /// Current reset epoch.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Append unconditionally.
    pub fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut inner = self.lock();
        inner.text.push_str(text);
        // Sent under the lock so subscribers see events in append order.
        let _ = self.tx.send(TranscriptEvent::Appended {
            text: text.to_string(),
        });
    }

    /// Append only if no reset happened since `epoch` was read.
    /// Returns `false` when the text was dropped.
    pub fn append_if_current(&self, epoch: u64, text: &str) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        if !text.is_empty() {
            inner.text.push_str(text);
            let _ = self.tx.send(TranscriptEvent::Appended {
                text: text.to_string(),
            });
        }
        true
    }

    /// Empty the buffer and invalidate every outstanding epoch.
    /// Returns the new epoch.
    pub fn reset(&self) -> u64 {
        let mut inner = self.lock();
        inner.text.clear();
        inner.epoch += 1;
        let _ = self.tx.send(TranscriptEvent::Cleared);
        inner.epoch
    }

    /// Concatenated text.
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().text.is_empty()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_concatenate() {
        let transcript = Transcript::new();
        transcript.append("Hello");
        transcript.append(", ");
        transcript.append("world");
        assert_eq!(transcript.text(), "Hello, world");
    }

    #[test]
    fn stale_epoch_is_dropped() {
        let transcript = Transcript::new();
        let epoch = transcript.epoch();
        assert!(transcript.append_if_current(epoch, "kept"));

        let next = transcript.reset();
        assert_eq!(next, epoch + 1);
        assert!(transcript.is_empty());

        assert!(!transcript.append_if_current(epoch, "late"));
        assert!(transcript.is_empty());
        assert!(transcript.append_if_current(next, "fresh"));
        assert_eq!(transcript.text(), "fresh");
    }

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let transcript = Transcript::new();
        let mut rx = transcript.subscribe();

        transcript.append("a");
        transcript.reset();
        transcript.append("b");
        transcript.append("");

        assert_eq!(
            rx.recv().await.unwrap(),
            TranscriptEvent::Appended {
                text: "a".to_string()
            }
        );
        assert_eq!(rx.recv().await.unwrap(), TranscriptEvent::Cleared);
        assert_eq!(
            rx.recv().await.unwrap(),
            TranscriptEvent::Appended {
                text: "b".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn event_wire_shape() {
        let json = serde_json::to_value(TranscriptEvent::Appended {
            text: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "append", "text": "hi"}));
        let json = serde_json::to_value(TranscriptEvent::Cleared).unwrap();
        assert_eq!(json, serde_json::json!({"type": "cleared"}));
    }
}
