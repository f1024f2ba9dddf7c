//! Selector-scoped subscriptions.
//!
//! A subscriber registers a pure selector over the team state plus a reaction.
//! After every committed mutation the store re-evaluates each selector and
//! fires the reaction only when the projection changed (by `PartialEq`).
//! Reactions run synchronously on the committing thread against the committed
//! snapshot. A panicking selector or reaction is isolated: the failure is
//! logged and other subscribers are unaffected.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::TeamState;

/// Identifier returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

pub(crate) struct SubscriptionEntry {
    pub(crate) id: SubscriptionId,
    /// Type-erased runner: evaluates the selector against the snapshot,
    /// compares with the previous projection, and fires the reaction on change.
    runner: Box<dyn Fn(&TeamState) + Send + Sync>,
}

impl SubscriptionEntry {
    pub(crate) fn run(&self, snapshot: &TeamState) {
        let result = catch_unwind(AssertUnwindSafe(|| (self.runner)(snapshot)));
        if let Err(panic) = result {
            let message = panic_message(&panic);
            tracing::error!(subscription_id = self.id.0, %message, "subscriber panicked; isolating");
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Registry of live subscriptions.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: Mutex<Vec<std::sync::Arc<SubscriptionEntry>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Register a selector/reaction pair.
    ///
    /// The reaction receives the previous projection (`None` on first fire),
    /// the current projection, and the committed state snapshot.
    pub(crate) fn subscribe<P, S, R>(&self, selector: S, reaction: R) -> SubscriptionId
    where
        P: PartialEq + Clone + Send + 'static,
        S: Fn(&TeamState) -> P + Send + Sync + 'static,
        R: Fn(Option<&P>, &P, &TeamState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let previous: Mutex<Option<P>> = Mutex::new(None);

        let runner = Box::new(move |snapshot: &TeamState| {
            let current = selector(snapshot);
            let mut prev = previous.lock().expect("subscription projection lock poisoned");
            let changed = prev.as_ref() != Some(&current);
            if changed {
                let old = prev.take();
                *prev = Some(current.clone());
                drop(prev);
                reaction(old.as_ref(), &current, snapshot);
            }
        });

        self.entries
            .lock()
            .expect("subscription registry lock poisoned")
            .push(std::sync::Arc::new(SubscriptionEntry { id, runner }));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.entries
            .lock()
            .expect("subscription registry lock poisoned")
            .retain(|entry| entry.id != id);
    }

    /// Snapshot the entry list so reactions can subscribe or unsubscribe
    /// without deadlocking on the registry lock.
    pub(crate) fn snapshot(&self) -> Vec<std::sync::Arc<SubscriptionEntry>> {
        self.entries
            .lock()
            .expect("subscription registry lock poisoned")
            .clone()
    }
}
