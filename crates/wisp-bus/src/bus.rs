use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::event::Event;
use crate::pattern::matches;

/// Opaque handle returned by [`EventBus::subscribe`], used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

/// `pattern -> subscriber list`, copy-on-write: each mutation clones the
/// affected `Vec`, wraps it in a fresh `Arc`, and swaps it in. Dispatch reads
/// take a snapshot (clone of the `Arc`) up front, so subscriptions added
/// mid-dispatch never affect the event currently being delivered.
type SubscriberTable = RwLock<HashMap<String, Arc<Vec<Subscription>>>>;

enum Command {
    Publish(Event),
    Drain(oneshot::Sender<()>),
}

/// In-process typed event bus. See the crate docs for the delivery model.
pub struct EventBus {
    subscribers: Arc<SubscriberTable>,
    next_id: Arc<AtomicU64>,
    cmd_tx: mpsc::Sender<Command>,
    cmd_rx: Mutex<Option<mpsc::Receiver<Command>>>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// `capacity` bounds the async publish queue; once full, `publish` blocks
    /// the caller (backpressure, not dropping).
    pub fn new(capacity: usize) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(capacity.max(1));
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            dispatch_task: Mutex::new(None),
        }
    }

    /// Registers `handler` for `pattern` (exact type, or `ns.*` wildcard).
    /// Multiple handlers on the same pattern fire in registration order.
    pub fn subscribe(
        &self,
        pattern: impl Into<String>,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pattern = pattern.into();
        let mut table = self.subscribers.write().expect("subscriber table poisoned");
        let entry = table.entry(pattern).or_insert_with(|| Arc::new(Vec::new()));
        let mut updated = (**entry).clone();
        updated.push(Subscription {
            id,
            handler: Arc::new(handler),
        });
        *entry = Arc::new(updated);
        id
    }

    /// Removes a previously registered subscription. No-op if already removed.
    pub fn unsubscribe(&self, pattern: &str, id: SubscriptionId) {
        let mut table = self.subscribers.write().expect("subscriber table poisoned");
        if let Some(entry) = table.get_mut(pattern) {
            let mut updated = (**entry).clone();
            updated.retain(|sub| sub.id != id);
            *entry = Arc::new(updated);
        }
    }

    /// Enqueues `event` for asynchronous dispatch and returns once enqueued.
    /// Blocks the caller if the internal queue is at its high-water mark.
    pub async fn publish(&self, event: Event) {
        if self.cmd_tx.send(Command::Publish(event)).await.is_err() {
            warn!("event bus publish after shutdown; event dropped");
        }
    }

    /// Dispatches `event` inline, on the caller's stack, bypassing the queue.
    /// Exactly-once per subscriber; used where subscribers must not race the
    /// publisher (e.g. the emotion pipeline's scoring notifications).
    pub fn publish_sync(&self, event: Event) {
        Self::dispatch(&self.subscribers, &event);
    }

    /// Completes once every event enqueued so far has been dispatched to all
    /// matching subscribers. Does not account for events published after
    /// this call returns (or concurrently with it).
    pub async fn wait_empty(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Drain(tx)).await.is_err() {
            return;
        }
        let _ = rx.await;
    }

    /// Spawns the background dispatch task consuming the publish queue.
    /// Calling `start` more than once (without an intervening `stop`) is a
    /// no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut task_slot = self.dispatch_task.lock().await;
        if task_slot.is_some() {
            return;
        }
        let mut rx = match self.cmd_rx.lock().await.take() {
            Some(rx) => rx,
            None => return,
        };
        let subscribers = Arc::clone(&self.subscribers);
        let handle = tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Publish(event) => Self::dispatch(&subscribers, &event),
                    Command::Drain(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });
        *task_slot = Some(handle);
    }

    /// Stops the dispatch task once the queue drains, dropping the sender
    /// side so any in-flight `publish`/`wait_empty` calls observe shutdown.
    pub async fn stop(&self) {
        let handle = self.dispatch_task.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    fn dispatch(subscribers: &SubscriberTable, event: &Event) {
        let snapshot: Vec<Arc<Vec<Subscription>>> = {
            let table = subscribers.read().expect("subscriber table poisoned");
            table
                .iter()
                .filter(|(pattern, _)| matches(pattern, &event.event_type))
                .map(|(_, subs)| Arc::clone(subs))
                .collect()
        };
        for subs in snapshot {
            for sub in subs.iter() {
                let handler = Arc::clone(&sub.handler);
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
                if let Err(panic) = result {
                    let message = panic_message(&panic);
                    warn!(event_type = %event.event_type, error = %message, "event bus subscriber panicked; skipped");
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
