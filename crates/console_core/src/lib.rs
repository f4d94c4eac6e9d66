use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use shared::{
    domain::{Band, EventTopic, StereoMode},
    protocol::{ApiName, BinderEvent, RadioRequest, Reply, VerbPath},
};
use tokio::{
    sync::{mpsc, watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod error;
pub mod highlight;
pub mod render;
pub mod scripted;
pub mod terminal;
pub mod transport;

pub use error::ConsoleError;
pub use render::{ConnectionState, ConsoleView, MemoryView};
pub use transport::{Binder, BinderConnector, Connection, MissingBinder, SessionNotice};

/// Base URL shown in question lines when none is configured.
pub const DEFAULT_BINDER_URL: &str = "ws://localhost:1234/api";

#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    /// Namespace typed requests are sent under.
    pub api: ApiName,
    /// Only used to render question lines; the connector owns the transport.
    pub binder_url: String,
    /// Topics subscribed on open and unsubscribed on abort.
    pub topics: Vec<EventTopic>,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            api: ApiName::default(),
            binder_url: DEFAULT_BINDER_URL.to_string(),
            topics: EventTopic::DEFAULTS.to_vec(),
        }
    }
}

/// Owns the one binder session of a console and turns user actions into calls.
///
/// Every call ends in exactly one render on the view: `OK: ...` when the
/// binder resolves it, `ERROR: ...` otherwise. Events are numbered from 0 in
/// arrival order.
pub struct ConsoleController {
    options: ConsoleOptions,
    view: Arc<dyn ConsoleView>,
    session: RwLock<Arc<dyn Binder>>,
    initialized: AtomicBool,
    state: watch::Sender<ConnectionState>,
    event_counter: AtomicU64,
    default_subscribes: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleController {
    pub fn new(options: ConsoleOptions, view: Arc<dyn ConsoleView>) -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Arc::new(Self {
            options,
            view,
            session: RwLock::new(Arc::new(MissingBinder)),
            initialized: AtomicBool::new(false),
            state,
            event_counter: AtomicU64::new(0),
            default_subscribes: Mutex::new(None),
        })
    }

    pub fn options(&self) -> &ConsoleOptions {
        &self.options
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Number of events rendered so far, i.e. the label of the next one.
    pub fn event_count(&self) -> u64 {
        self.event_counter.load(Ordering::SeqCst)
    }

    /// Opens the session and starts processing its notices.
    ///
    /// The returned task ends once the session aborts and the best-effort
    /// unsubscribes have completed. A controller connects at most once.
    pub async fn initialize(
        self: &Arc<Self>,
        connector: &dyn BinderConnector,
    ) -> Result<JoinHandle<()>, ConsoleError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(ConsoleError::AlreadyInitialized);
        }
        self.set_state(ConnectionState::Connecting);

        let Connection { session, notices } = connector.connect();
        *self.session.write().await = session;
        info!(binder_url = %self.options.binder_url, "binder session connecting");

        let controller = Arc::clone(self);
        Ok(tokio::spawn(async move {
            controller.process_notices(notices).await;
        }))
    }

    /// Waits until the subscribes issued on open have all been answered.
    ///
    /// Returns immediately when the session has not opened.
    pub async fn settle_subscriptions(&self) {
        let pending = self
            .default_subscribes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = pending {
            if let Err(err) = task.await {
                warn!(error = %err, "default subscribe task failed");
            }
        }
    }

    async fn process_notices(
        self: &Arc<Self>,
        mut notices: mpsc::UnboundedReceiver<SessionNotice>,
    ) {
        while let Some(notice) = notices.recv().await {
            match notice {
                SessionNotice::Opened => self.on_open().await,
                SessionNotice::Event(event) => self.on_event(&event),
                SessionNotice::Aborted => {
                    self.on_abort().await;
                    return;
                }
            }
        }
        warn!("binder notice channel dropped without abort");
        self.on_abort().await;
    }

    /// Subscribes run on their own task so events keep flowing while the
    /// replies are outstanding.
    async fn on_open(self: &Arc<Self>) {
        if self.state() == ConnectionState::Open {
            debug!("ignoring duplicate open notice");
            return;
        }
        self.set_state(ConnectionState::Open);
        info!(topics = ?self.options.topics, "binder session open");

        let controller = Arc::clone(self);
        let task = tokio::spawn(async move {
            let subscribes = controller.options.topics.iter().map(|topic| {
                let controller = &controller;
                async move {
                    controller
                        .request(&RadioRequest::Subscribe(*topic))
                        .await
                }
            });
            join_all(subscribes).await;
        });
        *self
            .default_subscribes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(task);
    }

    async fn on_abort(&self) {
        if self.state() == ConnectionState::Closed {
            return;
        }
        self.set_state(ConnectionState::Closed);
        warn!("binder session closed");

        let unsubscribes = self.options.topics.iter().map(|topic| async move {
            let reply = self.request(&RadioRequest::Unsubscribe(*topic)).await;
            if !reply.is_success() {
                warn!(topic = %topic, payload = %reply.payload(), "unsubscribe failed");
            }
        });
        join_all(unsubscribes).await;
    }

    fn on_event(&self, event: &BinderEvent) {
        let index = self.event_counter.fetch_add(1, Ordering::SeqCst);
        debug!(index, topic = %event.topic, payload = %event.payload, "gotevent");
        self.view.show_event(index, event);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
        self.view.show_status(state);
    }

    /// Sends `argument` to `path` and renders whichever way the call resolves.
    pub async fn invoke(&self, path: &VerbPath, argument: Value) -> Reply {
        let question = render::question_text(&self.options.binder_url, path, &argument);
        self.dispatch(path, argument, &question).await
    }

    async fn dispatch(&self, path: &VerbPath, argument: Value, question: &str) -> Reply {
        let verb = path.to_string();
        self.view.show_question(question);
        debug!(verb = %verb, argument = %argument, "calling binder");

        let session = Arc::clone(&*self.session.read().await);
        let reply = session.call(&verb, argument).await;
        match &reply {
            Reply::Success(payload) => debug!(verb = %verb, payload = %payload, "replyok"),
            Reply::Failure(payload) => debug!(verb = %verb, payload = %payload, "replyerr"),
        }
        self.view.show_reply(&reply);
        reply
    }

    /// Free-form call; nothing is sent when the path or argument is invalid.
    pub async fn call(
        &self,
        api: &str,
        verb: &str,
        argument: impl Serialize,
    ) -> Result<Reply, ConsoleError> {
        let path = VerbPath::new(api, verb)?;
        let argument = serde_json::to_value(argument).map_err(ConsoleError::Argument)?;
        Ok(self.invoke(&path, argument).await)
    }

    pub async fn request(&self, request: &RadioRequest) -> Reply {
        self.invoke(&request.path(&self.options.api), request.argument())
            .await
    }

    /// Sends an arbitrary message wrapped as `{"data": message}`.
    pub async fn send(&self, path: &VerbPath, message: Value) -> Reply {
        let question = render::send_question_text(path, &message);
        self.dispatch(path, json!({ "data": message }), &question)
            .await
    }

    pub async fn set_band(&self, band: Band) -> Reply {
        self.request(&RadioRequest::Band(Some(band))).await
    }

    pub async fn check_band(&self, band: Band) -> Reply {
        self.request(&RadioRequest::BandSupported(band)).await
    }

    pub async fn frequency_range(&self, band: Band) -> Reply {
        self.request(&RadioRequest::FrequencyRange(band)).await
    }

    pub async fn frequency_step(&self, band: Band) -> Reply {
        self.request(&RadioRequest::FrequencyStep(band)).await
    }

    pub async fn get_stereo_mode(&self) -> Reply {
        self.request(&RadioRequest::StereoMode(None)).await
    }

    pub async fn set_stereo_mode(&self, mode: StereoMode) -> Reply {
        self.request(&RadioRequest::StereoMode(Some(mode))).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
