//! In-process binder driven by a script instead of a network peer.
//!
//! Used by the test suites and by the console's offline replay mode. Replies
//! are looked up per verb; the lifecycle (open, events, abort) is pushed by
//! whoever holds the [`ScriptedBinder`].

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{BinderEvent, Reply},
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    error::ConsoleError,
    transport::{Binder, BinderConnector, Connection, SessionNotice},
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub verb: String,
    pub argument: Value,
}

#[derive(Debug, Clone)]
struct ScriptedReply {
    reply: Reply,
    delay: Option<Duration>,
}

#[derive(Default)]
pub struct ScriptedBinder {
    replies: Mutex<HashMap<String, ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
    notices: Mutex<Option<mpsc::UnboundedSender<SessionNotice>>>,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedBinder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn from_script(script: &SessionScript) -> Arc<Self> {
        let binder = Self::new();
        for (verb, reply) in &script.replies {
            let delay = script.delays_ms.get(verb).copied().map(Duration::from_millis);
            binder.insert_reply(verb, reply.clone(), delay);
        }
        binder
    }

    pub fn set_reply(&self, verb: &str, reply: Reply) {
        self.insert_reply(verb, reply, None);
    }

    pub fn set_delayed_reply(&self, verb: &str, reply: Reply, delay: Duration) {
        self.insert_reply(verb, reply, Some(delay));
    }

    fn insert_reply(&self, verb: &str, reply: Reply, delay: Option<Duration>) {
        lock(&self.replies).insert(verb.to_string(), ScriptedReply { reply, delay });
    }

    /// Calls received so far, in issue order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, verb: &str) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.verb == verb)
            .cloned()
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Reports the transport as ready. Returns `false` when nobody is connected.
    pub fn open(&self) -> bool {
        self.notify(SessionNotice::Opened)
    }

    pub fn emit(&self, event: BinderEvent) -> bool {
        self.notify(SessionNotice::Event(event))
    }

    /// Closes the transport; later calls are rejected but still recorded.
    pub fn abort(&self) -> bool {
        self.closed.store(true, Ordering::SeqCst);
        self.notify(SessionNotice::Aborted)
    }

    fn notify(&self, notice: SessionNotice) -> bool {
        match lock(&self.notices).as_ref() {
            Some(sender) => sender.send(notice).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Binder for ScriptedBinder {
    async fn call(&self, verb: &str, argument: Value) -> Reply {
        lock(&self.calls).push(RecordedCall {
            verb: verb.to_string(),
            argument,
        });

        if self.is_closed() {
            return Reply::Failure(
                ApiError::new(ErrorCode::Unavailable, "session closed").to_payload(),
            );
        }

        let scripted = lock(&self.replies).get(verb).cloned();
        let Some(scripted) = scripted else {
            debug!(verb, "no scripted reply");
            return Reply::Failure(
                ApiError::new(ErrorCode::NotFound, format!("no scripted reply for {verb}"))
                    .to_payload(),
            );
        };
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        scripted.reply
    }
}

/// Hands out the shared [`ScriptedBinder`] as the session of each connection.
pub struct ScriptedConnector {
    binder: Arc<ScriptedBinder>,
}

impl ScriptedConnector {
    pub fn new(binder: Arc<ScriptedBinder>) -> Self {
        Self { binder }
    }
}

impl BinderConnector for ScriptedConnector {
    fn connect(&self) -> Connection {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.binder.notices) = Some(tx);
        self.binder.closed.store(false, Ordering::SeqCst);
        Connection {
            session: self.binder.clone(),
            notices: rx,
        }
    }
}

/// Offline session description, loaded from JSON.
///
/// ```json
/// {
///   "open": true,
///   "events": [{"topic": "radio/frequency", "payload": {"value": 101100000}}],
///   "replies": {"radio/band": {"ok": {"band": "FM"}}},
///   "delays_ms": {"radio/band": 20}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionScript {
    /// Whether the transport comes up; `false` plays an immediate abort.
    pub open: bool,
    pub events: Vec<BinderEvent>,
    pub replies: BTreeMap<String, Reply>,
    pub delays_ms: BTreeMap<String, u64>,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self {
            open: true,
            events: Vec::new(),
            replies: BTreeMap::new(),
            delays_ms: BTreeMap::new(),
        }
    }
}

impl SessionScript {
    pub fn from_json(raw: &str) -> Result<Self, ConsoleError> {
        serde_json::from_str(raw).map_err(ConsoleError::Script)
    }

    /// Pushes the scripted lifecycle into `binder`: open (or abort), then
    /// every event in order.
    pub fn play(&self, binder: &ScriptedBinder) {
        if !self.open {
            binder.abort();
            return;
        }
        binder.open();
        for event in &self.events {
            binder.emit(event.clone());
        }
    }
}

#[cfg(test)]
#[path = "tests/scripted_tests.rs"]
mod tests;
