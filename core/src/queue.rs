//! Priority Message Queue (spec §4.1).
//!
//! Single synchronization point between external producers and the Agent
//! Loop. Strict FIFO within one priority band, strict priority dominance
//! across bands, bounded capacity with a drop-lowest backpressure policy.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering as AtomicOrdering;

use tokio::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use tracing::warn;
use writeflow_protocol::Message;

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueRejection {
    QueueClosed,
    QueueFull,
}

#[derive(Debug)]
pub enum DequeueOutcome {
    Message(Message),
    Closed,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueHealth {
    pub depth: usize,
    pub high_water_mark: usize,
    pub rejected: u64,
    pub evicted: u64,
    pub closed: bool,
}

/// Wraps a `Message` with a monotonic sequence number so that equal
/// priority ties break FIFO (spec §4.1: "At equal priority, FIFO is
/// preserved").
struct QueuedMessage {
    message: Message,
    sequence: u64,
}

impl PartialEq for QueuedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.message.priority == other.message.priority && self.sequence == other.sequence
    }
}
impl Eq for QueuedMessage {}

impl PartialOrd for QueuedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority, then lower sequence
        // number (earlier enqueue), should compare "greater" so it pops
        // first.
        self.message
            .priority
            .cmp(&other.message.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct Inner {
    heap: BinaryHeap<QueuedMessage>,
    closed: bool,
    high_water_mark: usize,
    rejected: u64,
    evicted: u64,
}

/// A message evicted by the drop-lowest backpressure policy, reported to
/// the overflow hook (spec §4.1).
pub type OverflowHook = Arc<dyn Fn(Message) + Send + Sync>;

pub struct MessageQueue {
    capacity: usize,
    inner: Mutex<Inner>,
    notify: Notify,
    sequence: AtomicU64,
    overflow_hook: Option<OverflowHook>,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                closed: false,
                high_water_mark: 0,
                rejected: 0,
                evicted: 0,
            }),
            notify: Notify::new(),
            sequence: AtomicU64::new(0),
            overflow_hook: None,
        }
    }

    pub fn with_overflow_hook(mut self, hook: OverflowHook) -> Self {
        self.overflow_hook = Some(hook);
        self
    }

    /// O(log C) insert. Rejects when closed; applies drop-lowest
    /// backpressure when at capacity (spec §4.1).
    pub async fn enqueue(&self, message: Message) -> Result<(), EnqueueRejection> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            inner.rejected += 1;
            return Err(EnqueueRejection::QueueClosed);
        }

        let sequence = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        let queued = QueuedMessage { message, sequence };

        if inner.heap.len() >= self.capacity {
            // Find the current minimum (lowest priority, then latest
            // sequence as a proxy since BinaryHeap has no peek-min).
            let min = inner
                .heap
                .iter()
                .min()
                .map(|m| (m.message.priority, m.sequence));

            match min {
                Some((min_priority, min_sequence)) if queued.message.priority > min_priority => {
                    // Evict the minimum, admit the new message.
                    let mut rebuilt = BinaryHeap::with_capacity(self.capacity);
                    let mut evicted_message = None;
                    for item in inner.heap.drain() {
                        if evicted_message.is_none()
                            && item.message.priority == min_priority
                            && item.sequence == min_sequence
                        {
                            evicted_message = Some(item.message);
                        } else {
                            rebuilt.push(item);
                        }
                    }
                    inner.heap = rebuilt;
                    inner.heap.push(queued);
                    inner.evicted += 1;
                    if let Some(evicted) = evicted_message {
                        if let Some(hook) = &self.overflow_hook {
                            hook(evicted);
                        }
                        warn!(evicted_priority = ?min_priority, "evicted lowest-priority message under backpressure");
                    }
                }
                _ => {
                    inner.rejected += 1;
                    debug!("queue full, rejecting incoming message (not higher priority than minimum)");
                    return Err(EnqueueRejection::QueueFull);
                }
            }
        } else {
            inner.heap.push(queued);
        }

        inner.high_water_mark = inner.high_water_mark.max(inner.heap.len());
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    /// Blocks until a message is available or the queue is closed. Wakes
    /// exactly one waiter per enqueue (spec §4.1: "no thundering herd") by
    /// relying on `Notify::notify_one` and re-checking state under the
    /// lock after each wake.
    pub async fn dequeue(&self) -> DequeueOutcome {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(item) = inner.heap.pop() {
                    return DequeueOutcome::Message(item.message);
                }
                if inner.closed {
                    return DequeueOutcome::Closed;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Idempotent. Subsequent enqueues fail; pending dequeues drain
    /// remaining items then receive `Closed`.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.closed = true;
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn health(&self) -> QueueHealth {
        let inner = self.inner.lock().await;
        QueueHealth {
            depth: inner.heap.len(),
            high_water_mark: inner.high_water_mark,
            rejected: inner.rejected,
            evicted: inner.evicted,
            closed: inner.closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use writeflow_protocol::MessageType;
    use writeflow_protocol::Priority;

    fn msg(priority: Priority) -> Message {
        Message::new(MessageType::UserInput, priority, json!({}), "test")
    }

    #[tokio::test]
    async fn fifo_within_band() {
        let q = MessageQueue::new(DEFAULT_CAPACITY);
        let m1 = msg(Priority::Low);
        let m2 = msg(Priority::Low);
        let id1 = m1.id;
        let id2 = m2.id;
        q.enqueue(m1).await.unwrap();
        q.enqueue(m2).await.unwrap();

        let first = match q.dequeue().await {
            DequeueOutcome::Message(m) => m,
            DequeueOutcome::Closed => panic!("unexpected close"),
        };
        let second = match q.dequeue().await {
            DequeueOutcome::Message(m) => m,
            DequeueOutcome::Closed => panic!("unexpected close"),
        };
        assert_eq!(first.id, id1);
        assert_eq!(second.id, id2);
    }

    #[tokio::test]
    async fn priority_dominance() {
        // Scenario 1: enqueue (Low, m1), (Low, m2), (High, m3); dequeue
        // thrice -> m3, m1, m2.
        let q = MessageQueue::new(DEFAULT_CAPACITY);
        let m1 = msg(Priority::Low);
        let m2 = msg(Priority::Low);
        let m3 = msg(Priority::High);
        let (id1, id2, id3) = (m1.id, m2.id, m3.id);
        q.enqueue(m1).await.unwrap();
        q.enqueue(m2).await.unwrap();
        q.enqueue(m3).await.unwrap();

        let order = [
            pop(&q).await,
            pop(&q).await,
            pop(&q).await,
        ];
        assert_eq!(order, [id3, id1, id2]);
    }

    async fn pop(q: &MessageQueue) -> writeflow_protocol::MessageId {
        match q.dequeue().await {
            DequeueOutcome::Message(m) => m.id,
            DequeueOutcome::Closed => panic!("unexpected close"),
        }
    }

    #[tokio::test]
    async fn backpressure_drop_lowest() {
        // Scenario 2: capacity 2; enqueue (Low,a),(Low,b),(High,c) ->
        // queue contains {c, a-or-b}; a subsequent (Low,d) is rejected.
        let q = MessageQueue::new(2);
        q.enqueue(msg(Priority::Low)).await.unwrap();
        q.enqueue(msg(Priority::Low)).await.unwrap();
        q.enqueue(msg(Priority::High)).await.unwrap();

        let health = q.health().await;
        assert_eq!(health.depth, 2);
        assert_eq!(health.evicted, 1);

        let rejected = q.enqueue(msg(Priority::Low)).await;
        assert_eq!(rejected, Err(EnqueueRejection::QueueFull));
    }

    #[tokio::test]
    async fn close_drains_then_reports_closed() {
        let q = MessageQueue::new(DEFAULT_CAPACITY);
        q.enqueue(msg(Priority::Normal)).await.unwrap();
        q.close().await;

        match q.dequeue().await {
            DequeueOutcome::Message(_) => {}
            DequeueOutcome::Closed => panic!("should drain pending item first"),
        }
        match q.dequeue().await {
            DequeueOutcome::Closed => {}
            DequeueOutcome::Message(_) => panic!("queue should be closed now"),
        }

        assert_eq!(q.enqueue(msg(Priority::Normal)).await, Err(EnqueueRejection::QueueClosed));
    }
}
