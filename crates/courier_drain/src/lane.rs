//! Type-erased queue/sender pairs driven by the pipeline.

use crate::error::{DrainError, DrainResult};
use crate::transport::BatchSender;
use courier_core::{Batch, TypedQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// What happened when a lane was asked for its next batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchStart {
    /// Nothing left to send.
    Empty,
    /// Every peeked record was malformed; this many were removed unsent.
    Discarded(u64),
    /// A send of this many records is running on a helper thread.
    Started(u64),
}

/// A queue paired with its sender, with the record type erased.
pub(crate) trait DrainLane: Send + Sync {
    fn name(&self) -> &str;

    fn size(&self) -> u64;

    /// Peeks up to `max` records and starts delivering them.
    ///
    /// `in_flight` is set while the send runs. The helper thread removes
    /// the batch on success, clears `in_flight`, then reports on `done`.
    fn send_next(
        &self,
        max: u64,
        in_flight: &Arc<AtomicBool>,
        done: Sender<DrainResult<()>>,
    ) -> DrainResult<BatchStart>;
}

pub(crate) struct QueueLane<T> {
    queue: Arc<TypedQueue<T>>,
    sender: Arc<dyn BatchSender<T>>,
}

impl<T> QueueLane<T> {
    pub(crate) fn new(queue: Arc<TypedQueue<T>>, sender: Arc<dyn BatchSender<T>>) -> Self {
        Self { queue, sender }
    }
}

/// Clears the in-flight flag when the send thread finishes, even by panic.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<T: Send + 'static> DrainLane for QueueLane<T> {
    fn name(&self) -> &str {
        self.queue.name()
    }

    fn size(&self) -> u64 {
        self.queue.size()
    }

    fn send_next(
        &self,
        max: u64,
        in_flight: &Arc<AtomicBool>,
        done: Sender<DrainResult<()>>,
    ) -> DrainResult<BatchStart> {
        let Batch {
            items,
            consumed,
            generation,
        } = self.queue.peek_batch(max)?;
        if consumed == 0 {
            return Ok(BatchStart::Empty);
        }
        if items.is_empty() {
            self.queue.remove_batch(generation, consumed)?;
            debug!(queue = self.name(), count = consumed, "discarded malformed records");
            return Ok(BatchStart::Discarded(consumed));
        }

        let records = items.len() as u64;
        let queue = Arc::clone(&self.queue);
        let sender = Arc::clone(&self.sender);
        in_flight.store(true, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(in_flight));

        thread::Builder::new()
            .name(format!("courier-send-{}", self.name()))
            .spawn(move || {
                let result = match items.as_slice() {
                    [item] => sender.send_one(item),
                    many => sender.send_batch(many),
                };
                // A clear while the send ran leaves the new records alone.
                let result = result.and_then(|()| {
                    queue
                        .remove_batch(generation, consumed)
                        .map(|_| ())
                        .map_err(DrainError::from)
                });
                drop(guard);
                // The pass may have timed out and gone away.
                let _ = done.send(result);
            })
            .map_err(DrainError::Spawn)?;

        Ok(BatchStart::Started(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockResponse, MockSender};
    use std::sync::mpsc;
    use std::time::Duration;

    fn lane_with(
        records: &[&str],
        sender: Arc<MockSender<String>>,
    ) -> (QueueLane<String>, Arc<TypedQueue<String>>) {
        let queue = Arc::new(TypedQueue::<String>::in_memory("test"));
        for record in records {
            queue.add(&record.to_string()).unwrap();
        }
        (QueueLane::new(Arc::clone(&queue), sender), queue)
    }

    #[test]
    fn empty_lane_starts_nothing() {
        let (lane, _) = lane_with(&[], Arc::new(MockSender::new()));
        let (tx, _rx) = mpsc::channel();
        let in_flight = Arc::new(AtomicBool::new(false));

        assert_eq!(lane.send_next(10, &in_flight, tx).unwrap(), BatchStart::Empty);
    }

    #[test]
    fn successful_send_removes_batch() {
        let sender = Arc::new(MockSender::new());
        let (lane, queue) = lane_with(&["a", "b", "c"], Arc::clone(&sender));
        let (tx, rx) = mpsc::channel();
        let in_flight = Arc::new(AtomicBool::new(false));

        assert_eq!(lane.send_next(2, &in_flight, tx).unwrap(), BatchStart::Started(2));
        rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

        assert!(!in_flight.load(Ordering::SeqCst));
        assert_eq!(queue.to_vec(), vec!["c".to_string()]);
        assert_eq!(sender.sent_items(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn single_record_uses_send_one() {
        let sender = Arc::new(MockSender::new());
        let (lane, _) = lane_with(&["only"], Arc::clone(&sender));
        let (tx, rx) = mpsc::channel();
        let in_flight = Arc::new(AtomicBool::new(false));

        lane.send_next(10, &in_flight, tx).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

        assert!(matches!(sender.calls()[0], crate::transport::SentCall::One(_)));
    }

    #[test]
    fn failed_send_keeps_batch() {
        let sender = Arc::new(MockSender::failing());
        let (lane, queue) = lane_with(&["a", "b"], sender);
        let (tx, rx) = mpsc::channel();
        let in_flight = Arc::new(AtomicBool::new(false));

        lane.send_next(10, &in_flight, tx).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_err());
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn late_success_after_clear_keeps_new_records() {
        let sender = Arc::new(MockSender::new());
        sender.push_response(MockResponse::Delay(Duration::from_millis(200), true));
        let (lane, queue) = lane_with(&["a", "b"], sender);
        let (tx, rx) = mpsc::channel();
        let in_flight = Arc::new(AtomicBool::new(false));

        assert_eq!(lane.send_next(10, &in_flight, tx).unwrap(), BatchStart::Started(2));
        queue.clear().unwrap();
        queue.add(&"c".to_string()).unwrap();

        rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(queue.to_vec(), vec!["c".to_string()]);
    }
}
