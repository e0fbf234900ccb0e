//! Enqueue facade for events and identities.

use crate::config::DrainConfig;
use crate::error::DrainResult;
use crate::http::{HttpClient, HttpSender};
use crate::pipeline::{DrainPipeline, LaneId};
use crate::reachability::{DnsReachability, Reachability};
use crate::transport::BatchSender;
use courier_core::{Config, Event, Identity, QueueKind, TypedQueue};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Senders for the two Courier queues.
pub struct Senders {
    /// Delivers tracked events.
    pub events: Arc<dyn BatchSender<Event>>,
    /// Delivers identities.
    pub identities: Arc<dyn BatchSender<Identity>>,
}

/// Application-facing entry point.
///
/// `track` and `identify` never fail: records are queued (durably when
/// possible) and a drain is requested. Delivery problems are logged and
/// retried by later triggers.
///
/// # Example
///
/// ```rust,no_run
/// use courier_core::{Config, Event};
/// use courier_drain::{Dispatcher, DrainConfig, HttpClient, HttpResponse};
///
/// #[derive(Clone)]
/// struct Client;
///
/// impl HttpClient for Client {
///     fn post(&self, _url: &str, _headers: &[(String, String)], _body: Vec<u8>)
///         -> Result<HttpResponse, String> {
///         Ok(HttpResponse::new(202))
///     }
/// }
///
/// let dispatcher = Dispatcher::with_http(
///     &Config::new("/var/lib/app"),
///     DrainConfig::new("api.example.com"),
///     Client,
/// )
/// .unwrap();
/// dispatcher.track(Event::new("app_open"));
/// ```
pub struct Dispatcher {
    events: Arc<TypedQueue<Event>>,
    identities: Arc<TypedQueue<Identity>>,
    pipeline: DrainPipeline,
    events_lane: LaneId,
    identities_lane: LaneId,
    current: RwLock<Identity>,
}

impl Dispatcher {
    /// Opens both queues under `config` and starts draining them.
    ///
    /// # Errors
    ///
    /// Returns an error if the drain worker cannot be started.
    pub fn start(
        config: &Config,
        drain: DrainConfig,
        senders: Senders,
        reachability: Arc<dyn Reachability>,
    ) -> DrainResult<Self> {
        let events = Arc::new(TypedQueue::open(config, QueueKind::Events));
        let identities = Arc::new(TypedQueue::open(config, QueueKind::Identities));
        Self::from_queues(events, identities, drain, senders, reachability)
    }

    /// Opens both queues and delivers them over HTTP to the configured
    /// host, checking reachability by DNS.
    ///
    /// # Errors
    ///
    /// Returns an error if the drain worker cannot be started.
    pub fn with_http<C>(config: &Config, drain: DrainConfig, client: C) -> DrainResult<Self>
    where
        C: HttpClient + Clone + 'static,
    {
        let base_url = drain.base_url();
        let senders = Senders {
            events: Arc::new(HttpSender::track(base_url.clone(), client.clone())),
            identities: Arc::new(HttpSender::identify(base_url, client)),
        };
        Self::start(config, drain, senders, Arc::new(DnsReachability))
    }

    /// Starts draining queues the caller already opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the drain worker cannot be started.
    pub fn from_queues(
        events: Arc<TypedQueue<Event>>,
        identities: Arc<TypedQueue<Identity>>,
        drain: DrainConfig,
        senders: Senders,
        reachability: Arc<dyn Reachability>,
    ) -> DrainResult<Self> {
        let mut builder = DrainPipeline::builder(drain).reachability(reachability);
        let events_lane = builder.lane(Arc::clone(&events), senders.events);
        let identities_lane = builder.lane(Arc::clone(&identities), senders.identities);
        let pipeline = builder.start()?;

        if !events.is_durable() || !identities.is_durable() {
            warn!("queues are not durable; records will not survive a restart");
        }

        Ok(Self {
            events,
            identities,
            pipeline,
            events_lane,
            identities_lane,
            current: RwLock::new(Identity::anonymous()),
        })
    }

    /// Queues an event for the current user and requests a drain.
    pub fn track(&self, mut event: Event) {
        if event.user_id.is_none() {
            event.user_id = Some(self.current_user_id());
        }
        if let Err(e) = self.events.add(&event) {
            warn!(event = %event.event, error = %e, "failed to queue event");
            return;
        }
        debug!(event = %event.event, "queued event");
        self.pipeline.flush(self.events_lane);
    }

    /// Makes `identity` the current user, queues it and requests a drain.
    ///
    /// Identifying a different user without logging out first aliases the
    /// new user to the previous one.
    pub fn identify(&self, mut identity: Identity) {
        {
            let mut current = self.current.write();
            if identity.previous_id.is_none() && current.user_id != identity.user_id {
                identity.previous_id = Some(current.user_id.clone());
            }
            *current = identity.clone();
        }
        if let Err(e) = self.identities.add(&identity) {
            warn!(user = %identity.user_id, error = %e, "failed to queue identity");
            return;
        }
        debug!(user = %identity.user_id, "queued identity");
        self.pipeline.flush(self.identities_lane);
    }

    /// Drops everything queued and starts over as a new anonymous user.
    pub fn logout(&self) {
        if let Err(e) = self.events.clear() {
            warn!(error = %e, "failed to clear event queue");
        }
        if let Err(e) = self.identities.clear() {
            warn!(error = %e, "failed to clear identity queue");
        }
        *self.current.write() = Identity::anonymous();
    }

    /// Returns the id stamped on tracked events.
    pub fn current_user_id(&self) -> String {
        self.current.read().user_id.clone()
    }

    /// Requests a drain of both queues. Returns the number of passes queued.
    pub fn flush(&self) -> usize {
        self.pipeline.flush_all()
    }

    /// Returns the event queue.
    pub fn events(&self) -> &Arc<TypedQueue<Event>> {
        &self.events
    }

    /// Returns the identity queue.
    pub fn identities(&self) -> &Arc<TypedQueue<Identity>> {
        &self.identities
    }

    /// Returns the pipeline.
    pub fn pipeline(&self) -> &DrainPipeline {
        &self.pipeline
    }

    /// Returns the event lane.
    pub fn events_lane(&self) -> LaneId {
        self.events_lane
    }

    /// Returns the identity lane.
    pub fn identities_lane(&self) -> LaneId {
        self.identities_lane
    }

    /// Stops the drain worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked.
    pub fn shutdown(&self) -> DrainResult<()> {
        self.pipeline.shutdown()
    }
}
