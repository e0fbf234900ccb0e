//! The drain pipeline: one worker thread delivering every registered queue.
//!
//! # Lifecycle of a pass
//!
//! ```text
//! trigger ──► reachable? ──► size > 0? ──► already pending? ──► queue Run(lane)
//!                 │no            │no              │yes
//!                 └──────────────┴────────────────┴──► skipped
//!
//! worker: Run(lane) ──► in flight? ──yes──► skipped (Busy)
//!                           │no
//!                           ▼
//!             ┌──► peek batch ──empty──► Completed
//!             │        │
//!             │   send on helper thread, wait ≤ send_timeout
//!             │        │ok (batch removed)        │error / timeout
//!             └────────┘                          └──► Aborted
//! ```
//!
//! Passes never overlap: the worker runs them one at a time, across all
//! lanes. A send that outlives its timeout keeps running; its lane skips
//! new passes until it completes, and a late success still removes the
//! batch it delivered.

use crate::config::DrainConfig;
use crate::error::{DrainError, DrainResult};
use crate::lane::{BatchStart, DrainLane, QueueLane};
use crate::reachability::{DnsReachability, Reachability};
use crate::state::{DrainState, DrainStats, PassOutcome, SkipReason};
use crate::transport::BatchSender;
use courier_core::TypedQueue;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Identifies a queue registered with a [`DrainPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaneId(usize);

impl LaneId {
    /// Index of the lane in registration order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane-{}", self.0)
    }
}

enum Command {
    Run {
        lane: LaneId,
        reply: Option<Sender<PassOutcome>>,
    },
    Shutdown,
}

struct LaneSlot {
    lane: Box<dyn DrainLane>,
    pending: AtomicBool,
    in_flight: Arc<AtomicBool>,
    cancelled: AtomicBool,
    state: RwLock<DrainState>,
    stats: RwLock<DrainStats>,
}

impl LaneSlot {
    fn new(lane: Box<dyn DrainLane>) -> Self {
        Self {
            lane,
            pending: AtomicBool::new(false),
            in_flight: Arc::new(AtomicBool::new(false)),
            cancelled: AtomicBool::new(false),
            state: RwLock::new(DrainState::Idle),
            stats: RwLock::new(DrainStats::default()),
        }
    }

    fn skip(&self, reason: SkipReason) -> PassOutcome {
        let outcome = PassOutcome::Skipped(reason);
        self.stats.write().record(&outcome);
        outcome
    }
}

struct Shared {
    config: DrainConfig,
    reachability: Arc<dyn Reachability>,
    lanes: Vec<LaneSlot>,
    rotation: AtomicUsize,
}

impl Shared {
    fn slot(&self, lane: LaneId) -> DrainResult<&LaneSlot> {
        self.lanes.get(lane.0).ok_or(DrainError::UnknownLane(lane.0))
    }

    fn is_reachable(&self) -> bool {
        let reachable = self.reachability.is_reachable(&self.config.host);
        if !reachable {
            debug!(host = %self.config.host, "host unreachable, skipping drain");
        }
        reachable
    }

    /// Checks made on the triggering thread before a pass is queued.
    fn check_trigger(&self, slot: &LaneSlot) -> Result<(), SkipReason> {
        if !self.is_reachable() {
            return Err(SkipReason::Unreachable);
        }
        if slot.lane.size() == 0 {
            return Err(SkipReason::Empty);
        }
        Ok(())
    }

    /// Lane order for a multi-lane trigger; the first lane rotates on every
    /// call.
    fn rotated_lanes(&self) -> Vec<LaneId> {
        let count = self.lanes.len();
        if count == 0 {
            return Vec::new();
        }
        let start = self.rotation.fetch_add(1, Ordering::SeqCst) % count;
        (0..count).map(|i| LaneId((start + i) % count)).collect()
    }

    fn run_pass(&self, id: LaneId, slot: &LaneSlot) -> PassOutcome {
        slot.pending.store(false, Ordering::SeqCst);

        if slot.in_flight.load(Ordering::SeqCst) {
            debug!(queue = slot.lane.name(), "previous send still in flight, skipping pass");
            return slot.skip(SkipReason::Busy);
        }

        slot.cancelled.store(false, Ordering::SeqCst);
        *slot.state.write() = DrainState::Draining;
        slot.stats.write().passes_started += 1;
        debug!(queue = slot.lane.name(), lane = %id, "drain pass started");

        let mut sent = 0u64;
        let mut batches = 0u64;
        let outcome = loop {
            if slot.cancelled.load(Ordering::SeqCst) {
                break PassOutcome::Cancelled { sent, batches };
            }

            let (done_tx, done_rx) = mpsc::channel();
            let start = slot
                .lane
                .send_next(self.config.batch_size, &slot.in_flight, done_tx);

            match start {
                Ok(BatchStart::Empty) => break PassOutcome::Completed { sent, batches },
                Ok(BatchStart::Discarded(count)) => {
                    slot.stats.write().records_discarded += count;
                }
                Ok(BatchStart::Started(count)) => {
                    match done_rx.recv_timeout(self.config.send_timeout) {
                        Ok(Ok(())) => {
                            sent += count;
                            batches += 1;
                            let mut stats = slot.stats.write();
                            stats.records_sent += count;
                            stats.batches_sent += 1;
                        }
                        Ok(Err(e)) => {
                            warn!(queue = slot.lane.name(), error = %e, "send failed, ending pass");
                            break aborted(sent, batches, &e);
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            warn!(
                                queue = slot.lane.name(),
                                timeout = ?self.config.send_timeout,
                                "send timed out, ending pass"
                            );
                            slot.stats.write().timeouts += 1;
                            break aborted(sent, batches, &DrainError::Timeout);
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            let e = DrainError::send("send thread exited without a result");
                            warn!(queue = slot.lane.name(), error = %e, "ending pass");
                            break aborted(sent, batches, &e);
                        }
                    }
                }
                Err(e) => {
                    warn!(queue = slot.lane.name(), error = %e, "cannot read batch, ending pass");
                    break aborted(sent, batches, &e);
                }
            }
        };

        *slot.state.write() = DrainState::Idle;
        slot.stats.write().record(&outcome);
        debug!(queue = slot.lane.name(), ?outcome, "drain pass finished");
        outcome
    }

    /// Periodic flush of every lane, run on the worker thread.
    fn tick(&self) {
        if !self.is_reachable() {
            return;
        }
        for id in self.rotated_lanes() {
            let Some(slot) = self.lanes.get(id.0) else {
                continue;
            };
            // A queued trigger will run this lane shortly.
            if slot.pending.load(Ordering::SeqCst) || slot.lane.size() == 0 {
                continue;
            }
            self.run_pass(id, slot);
        }
    }
}

fn aborted(sent: u64, batches: u64, error: &DrainError) -> PassOutcome {
    PassOutcome::Aborted {
        sent,
        batches,
        error: error.to_string(),
    }
}

struct Worker {
    shared: Arc<Shared>,
    commands: Receiver<Command>,
}

impl Worker {
    fn run(self) {
        info!(lanes = self.shared.lanes.len(), "drain worker started");
        let interval = self.shared.config.flush_interval;
        let mut next_tick = interval.map(|i| Instant::now() + i);

        loop {
            let received = match next_tick {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    self.commands.recv_timeout(wait)
                }
                None => self
                    .commands
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(Command::Run { lane, reply }) => {
                    let outcome = match self.shared.slot(lane) {
                        Ok(slot) => self.shared.run_pass(lane, slot),
                        Err(_) => continue,
                    };
                    if let Some(reply) = reply {
                        let _ = reply.send(outcome);
                    }
                }
                Ok(Command::Shutdown) => {
                    info!("drain worker received shutdown");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.shared.tick();
                    next_tick = interval.map(|i| Instant::now() + i);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("drain worker stopped");
    }
}

/// Builder for [`DrainPipeline`].
pub struct DrainPipelineBuilder {
    config: DrainConfig,
    reachability: Arc<dyn Reachability>,
    lanes: Vec<LaneSlot>,
}

impl DrainPipelineBuilder {
    /// Sets the reachability check. Defaults to [`DnsReachability`].
    #[must_use]
    pub fn reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = reachability;
        self
    }

    /// Registers a queue and the sender that delivers it.
    pub fn lane<T>(&mut self, queue: Arc<TypedQueue<T>>, sender: Arc<dyn BatchSender<T>>) -> LaneId
    where
        T: Send + 'static,
    {
        let id = LaneId(self.lanes.len());
        self.lanes
            .push(LaneSlot::new(Box::new(QueueLane::new(queue, sender))));
        id
    }

    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn start(self) -> DrainResult<DrainPipeline> {
        let shared = Arc::new(Shared {
            config: self.config,
            reachability: self.reachability,
            lanes: self.lanes,
            rotation: AtomicUsize::new(0),
        });
        let (tx, rx) = mpsc::channel();

        let worker = Worker {
            shared: Arc::clone(&shared),
            commands: rx,
        };
        let handle = thread::Builder::new()
            .name("courier-drain".into())
            .spawn(move || worker.run())
            .map_err(DrainError::Spawn)?;

        Ok(DrainPipeline {
            shared,
            commands: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
        })
    }
}

/// Delivers registered queues to the network on a background worker.
///
/// # Example
///
/// ```rust
/// use courier_core::{Event, TypedQueue};
/// use courier_drain::{AlwaysReachable, DrainConfig, DrainPipeline, MockSender, PassOutcome};
/// use std::sync::Arc;
///
/// let queue = Arc::new(TypedQueue::<Event>::in_memory("events"));
/// queue.add(&Event::new("signup")).unwrap();
///
/// let mut builder = DrainPipeline::builder(DrainConfig::new("api.example.com"))
///     .reachability(Arc::new(AlwaysReachable));
/// let events = builder.lane(Arc::clone(&queue), Arc::new(MockSender::<Event>::new()));
/// let pipeline = builder.start().unwrap();
///
/// let outcome = pipeline.flush_now(events).unwrap();
/// assert_eq!(outcome.sent(), 1);
/// assert!(queue.is_empty());
/// ```
pub struct DrainPipeline {
    shared: Arc<Shared>,
    commands: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DrainPipeline {
    /// Creates a builder.
    pub fn builder(config: DrainConfig) -> DrainPipelineBuilder {
        DrainPipelineBuilder {
            config,
            reachability: Arc::new(DnsReachability),
            lanes: Vec::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DrainConfig {
        &self.shared.config
    }

    /// Returns every registered lane.
    pub fn lanes(&self) -> Vec<LaneId> {
        (0..self.shared.lanes.len()).map(LaneId).collect()
    }

    /// Returns the queue name of a lane.
    pub fn lane_name(&self, lane: LaneId) -> Option<&str> {
        self.shared.lanes.get(lane.0).map(|slot| slot.lane.name())
    }

    /// Requests a pass for one lane.
    ///
    /// Returns true if a pass was queued. Nothing is queued when the host
    /// is unreachable, the queue is empty, or a pass is already pending.
    pub fn flush(&self, lane: LaneId) -> bool {
        let Ok(slot) = self.shared.slot(lane) else {
            return false;
        };
        if let Err(reason) = self.shared.check_trigger(slot) {
            slot.skip(reason);
            return false;
        }
        self.enqueue(lane, slot)
    }

    /// Requests a pass for every lane, alternating which goes first.
    ///
    /// Returns the number of passes queued.
    pub fn flush_all(&self) -> usize {
        if !self.shared.is_reachable() {
            for slot in &self.shared.lanes {
                slot.skip(SkipReason::Unreachable);
            }
            return 0;
        }

        let mut queued = 0;
        for id in self.shared.rotated_lanes() {
            let Ok(slot) = self.shared.slot(id) else {
                continue;
            };
            if slot.lane.size() == 0 {
                slot.skip(SkipReason::Empty);
                continue;
            }
            if self.enqueue(id, slot) {
                queued += 1;
            }
        }
        queued
    }

    /// Runs a pass for one lane on the worker and waits for its outcome.
    ///
    /// The same trigger checks as [`DrainPipeline::flush`] apply; a skipped
    /// pass is reported as [`PassOutcome::Skipped`].
    ///
    /// # Errors
    ///
    /// Returns an error if the lane is unknown or the pipeline is shut down.
    pub fn flush_now(&self, lane: LaneId) -> DrainResult<PassOutcome> {
        let slot = self.shared.slot(lane)?;
        if let Err(reason) = self.shared.check_trigger(slot) {
            return Ok(slot.skip(reason));
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_command(Command::Run {
            lane,
            reply: Some(reply_tx),
        })?;
        reply_rx.recv().map_err(|_| DrainError::Shutdown)
    }

    /// Cancels the running pass of a lane after its current batch.
    pub fn cancel(&self, lane: LaneId) {
        if let Ok(slot) = self.shared.slot(lane) {
            slot.cancelled.store(true, Ordering::SeqCst);
        }
    }

    /// Returns the state of a lane.
    pub fn state(&self, lane: LaneId) -> DrainState {
        self.shared
            .slot(lane)
            .map(|slot| *slot.state.read())
            .unwrap_or_default()
    }

    /// Returns the statistics of a lane.
    pub fn stats(&self, lane: LaneId) -> DrainStats {
        self.shared
            .slot(lane)
            .map(|slot| slot.stats.read().clone())
            .unwrap_or_default()
    }

    /// Returns true while a send for the lane is outstanding.
    pub fn is_in_flight(&self, lane: LaneId) -> bool {
        self.shared
            .slot(lane)
            .map(|slot| slot.in_flight.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Stops the worker after the pass it is running, if any.
    ///
    /// Sends that timed out earlier may still complete in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked.
    pub fn shutdown(&self) -> DrainResult<()> {
        if let Some(tx) = self.commands.lock().take() {
            let _ = tx.send(Command::Shutdown);
        }
        if let Some(handle) = self.worker.lock().take() {
            handle
                .join()
                .map_err(|_| DrainError::send("drain worker panicked"))?;
        }
        Ok(())
    }

    fn enqueue(&self, lane: LaneId, slot: &LaneSlot) -> bool {
        if slot.pending.swap(true, Ordering::SeqCst) {
            slot.skip(SkipReason::Pending);
            return false;
        }
        if self
            .send_command(Command::Run { lane, reply: None })
            .is_err()
        {
            slot.pending.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn send_command(&self, command: Command) -> DrainResult<()> {
        match self.commands.lock().as_ref() {
            Some(tx) => tx.send(command).map_err(|_| DrainError::Shutdown),
            None => Err(DrainError::Shutdown),
        }
    }
}

impl Drop for DrainPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "drain worker did not stop cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reachability::MockReachability;
    use crate::transport::{MockResponse, MockSender};
    use std::time::Duration;

    fn config() -> DrainConfig {
        DrainConfig::new("api.example.com").without_flush_interval()
    }

    fn queue_of(count: usize) -> Arc<TypedQueue<u32>> {
        let queue = Arc::new(TypedQueue::<u32>::in_memory("numbers"));
        for i in 0..count {
            queue.add(&(i as u32)).unwrap();
        }
        queue
    }

    fn start(
        config: DrainConfig,
        queue: &Arc<TypedQueue<u32>>,
        sender: &Arc<MockSender<u32>>,
    ) -> (DrainPipeline, LaneId) {
        let mut builder = DrainPipeline::builder(config)
            .reachability(Arc::new(MockReachability::new(true)));
        let lane = builder.lane(Arc::clone(queue), Arc::clone(sender) as Arc<dyn BatchSender<u32>>);
        (builder.start().unwrap(), lane)
    }

    #[test]
    fn pass_drains_in_batches() {
        let queue = queue_of(250);
        let sender = Arc::new(MockSender::new());
        let (pipeline, lane) = start(config(), &queue, &sender);

        let outcome = pipeline.flush_now(lane).unwrap();
        assert_eq!(outcome, PassOutcome::Completed { sent: 250, batches: 3 });
        assert!(queue.is_empty());

        let sizes: Vec<_> = sender.calls().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(sender.sent_items(), (0..250).collect::<Vec<_>>());
    }

    #[test]
    fn empty_queue_is_skipped() {
        let queue = queue_of(0);
        let sender = Arc::new(MockSender::new());
        let (pipeline, lane) = start(config(), &queue, &sender);

        assert_eq!(
            pipeline.flush_now(lane).unwrap(),
            PassOutcome::Skipped(SkipReason::Empty)
        );
        assert!(!pipeline.flush(lane));
        assert_eq!(sender.call_count(), 0);
    }

    #[test]
    fn cancel_before_pass_does_not_stick() {
        let queue = queue_of(3);
        let sender = Arc::new(MockSender::new());
        let (pipeline, lane) = start(config(), &queue, &sender);

        pipeline.cancel(lane);
        assert!(pipeline.flush_now(lane).unwrap().is_completed());
    }

    #[test]
    fn timeout_blocks_lane_until_send_completes() {
        let queue = queue_of(5);
        let sender = Arc::new(MockSender::new());
        sender.push_response(MockResponse::Delay(Duration::from_millis(400), true));
        let config = config().with_send_timeout(Duration::from_millis(50));
        let (pipeline, lane) = start(config, &queue, &sender);

        let outcome = pipeline.flush_now(lane).unwrap();
        assert!(matches!(outcome, PassOutcome::Aborted { sent: 0, .. }));
        assert!(pipeline.is_in_flight(lane));
        assert_eq!(queue.size(), 5);

        // The lane refuses to start another pass while the send is out.
        assert_eq!(
            pipeline.flush_now(lane).unwrap(),
            PassOutcome::Skipped(SkipReason::Busy)
        );
        assert_eq!(sender.call_count(), 1);

        // The late success still removes the delivered batch.
        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.is_in_flight(lane) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!pipeline.is_in_flight(lane));
        assert!(queue.is_empty());
        assert_eq!(pipeline.stats(lane).timeouts, 1);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let queue = queue_of(1);
        let sender = Arc::new(MockSender::new());
        let (pipeline, lane) = start(config(), &queue, &sender);

        pipeline.shutdown().unwrap();
        pipeline.shutdown().unwrap();
        assert!(matches!(pipeline.flush_now(lane), Err(DrainError::Shutdown)));
        assert!(!pipeline.flush(lane));
    }

    #[test]
    fn periodic_tick_drains_without_trigger() {
        let queue = queue_of(3);
        let sender = Arc::new(MockSender::new());
        let config = DrainConfig::new("api.example.com")
            .with_flush_interval(Duration::from_millis(20));
        let (pipeline, lane) = start(config, &queue, &sender);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !queue.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(queue.is_empty());
        assert!(pipeline.stats(lane).passes_completed >= 1);
    }

    #[test]
    fn lane_ids_and_names() {
        let queue = queue_of(0);
        let sender = Arc::new(MockSender::new());
        let (pipeline, lane) = start(config(), &queue, &sender);

        assert_eq!(pipeline.lanes(), vec![lane]);
        assert_eq!(pipeline.lane_name(lane), Some("numbers"));
        assert_eq!(lane.to_string(), "lane-0");
        assert_eq!(pipeline.state(lane), DrainState::Idle);
    }
}
