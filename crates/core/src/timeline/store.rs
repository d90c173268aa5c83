//! Timeline storage.

use tokio::sync::watch;
use tracing::debug;

use super::types::{TimelineItem, TimelineSnapshot, TimelineUpdate};

/// Sink the orchestrator writes progress into.
///
/// Implementations must be cheap to call; they run inline with stage logic.
pub trait TimelineSink: Send + Sync {
    /// Drop the committed log and the current slot.
    fn clear(&self);

    /// Add an item to the end of the committed log.
    fn append(&self, item: TimelineItem);

    /// Merge `update` into the last item with `id`. No-op when absent.
    fn update_by_id(&self, id: &str, update: TimelineUpdate);

    /// Replace the in-progress slot; `None` clears it.
    fn set_current(&self, item: Option<TimelineItem>);
}

/// In-memory timeline that publishes every change to subscribers.
#[derive(Debug)]
pub struct TimelineStore {
    tx: watch::Sender<TimelineSnapshot>,
}

impl Default for TimelineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(TimelineSnapshot::default());
        Self { tx }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> TimelineSnapshot {
        self.tx.borrow().clone()
    }

    /// Committed log followed by the current slot.
    pub fn render(&self) -> Vec<TimelineItem> {
        self.tx.borrow().render()
    }

    /// Receive a notification on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<TimelineSnapshot> {
        self.tx.subscribe()
    }
}

impl TimelineSink for TimelineStore {
    fn clear(&self) {
        self.tx.send_modify(|snapshot| {
            snapshot.items.clear();
            snapshot.current = None;
        });
    }

    fn append(&self, item: TimelineItem) {
        debug!(id = %item.id, status = item.status.as_str(), "timeline append: {}", item.title);
        self.tx.send_modify(|snapshot| snapshot.items.push(item));
    }

    fn update_by_id(&self, id: &str, update: TimelineUpdate) {
        self.tx.send_if_modified(|snapshot| {
            match snapshot.items.iter_mut().rev().find(|item| item.id == id) {
                Some(item) => {
                    item.apply(update);
                    debug!(id = %id, status = item.status.as_str(), "timeline update");
                    true
                }
                None => {
                    debug!(id = %id, "timeline update for unknown id ignored");
                    false
                }
            }
        });
    }

    fn set_current(&self, item: Option<TimelineItem>) {
        self.tx.send_modify(|snapshot| snapshot.current = item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{TimelineStatus, CURRENT_ITEM_ID};

    #[test]
    fn test_append_preserves_order() {
        let store = TimelineStore::new();
        store.append(TimelineItem::success("a", "A", ""));
        store.append(TimelineItem::success("b", "B", ""));
        store.append(TimelineItem::success("c", "C", ""));

        let ids: Vec<_> = store.render().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_update_by_id_keeps_position() {
        let store = TimelineStore::new();
        store.append(TimelineItem::waiting("deploy", "Deploying", "Building"));
        store.append(TimelineItem::waiting("verify", "Verifying", ""));

        store.update_by_id(
            "deploy",
            TimelineUpdate::success("Deployed", "Transaction sent"),
        );

        let items = store.render();
        assert_eq!(items[0].id, "deploy");
        assert_eq!(items[0].status, TimelineStatus::Success);
        assert_eq!(items[0].title, "Deployed");
        assert_eq!(items[1].id, "verify");
        assert_eq!(items[1].status, TimelineStatus::Waiting);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let store = TimelineStore::new();
        store.append(TimelineItem::waiting("a", "A", ""));
        let before = store.snapshot();

        store.update_by_id("missing", TimelineUpdate::status(TimelineStatus::Error));

        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_update_targets_last_matching_item() {
        let store = TimelineStore::new();
        store.append(TimelineItem::error("mint", "First", ""));
        store.append(TimelineItem::waiting("mint", "Second", ""));

        store.update_by_id("mint", TimelineUpdate::status(TimelineStatus::Success));

        let items = store.render();
        assert_eq!(items[0].status, TimelineStatus::Error);
        assert_eq!(items[1].status, TimelineStatus::Success);
    }

    #[test]
    fn test_current_slot_rendered_after_log() {
        let store = TimelineStore::new();
        store.set_current(Some(TimelineItem::current("Issuing token", "Checking data...")));
        store.append(TimelineItem::success("wallet", "Connected", ""));

        let items = store.render();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, CURRENT_ITEM_ID);

        store.set_current(None);
        assert_eq!(store.render().len(), 1);
    }

    #[test]
    fn test_render_does_not_mutate() {
        let store = TimelineStore::new();
        store.append(TimelineItem::success("a", "A", ""));
        store.set_current(Some(TimelineItem::current("Working", "")));

        let _ = store.render();
        let _ = store.render();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert!(snapshot.current.is_some());
    }

    #[test]
    fn test_clear_resets_log_and_current() {
        let store = TimelineStore::new();
        store.append(TimelineItem::success("a", "A", ""));
        store.set_current(Some(TimelineItem::current("Working", "")));

        store.clear();

        assert!(store.render().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let store = TimelineStore::new();
        let mut rx = store.subscribe();

        store.append(TimelineItem::waiting("wallet", "Connecting", ""));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().items.len(), 1);

        store.update_by_id("wallet", TimelineUpdate::status(TimelineStatus::Success));
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().items[0].status,
            TimelineStatus::Success
        );
    }
}
