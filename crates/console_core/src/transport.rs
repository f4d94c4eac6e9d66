//! Contract consumed from the binder client library.
//!
//! The console never frames messages itself: a connector hands back a session
//! that can issue calls, plus a channel of lifecycle notices and events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{BinderEvent, Reply},
};
use tokio::sync::mpsc;

/// Something the session reports outside the call/reply cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// Transport is ready; fired at most once.
    Opened,
    /// Any event pushed by the binder, whatever its topic.
    Event(BinderEvent),
    /// Transport closed or never came up.
    Aborted,
}

#[async_trait]
pub trait Binder: Send + Sync {
    /// Invokes `verb` (`api/verb`) with `argument`, resolving once the binder
    /// answers. Transport failures surface as [`Reply::Failure`].
    async fn call(&self, verb: &str, argument: Value) -> Reply;
}

pub struct Connection {
    pub session: Arc<dyn Binder>,
    pub notices: mpsc::UnboundedReceiver<SessionNotice>,
}

pub trait BinderConnector: Send + Sync {
    /// Starts exactly one connection attempt. The outcome arrives on
    /// [`Connection::notices`] as `Opened` or `Aborted`.
    fn connect(&self) -> Connection;
}

/// Stand-in used until a session exists; every call is rejected locally.
pub struct MissingBinder;

#[async_trait]
impl Binder for MissingBinder {
    async fn call(&self, verb: &str, _argument: Value) -> Reply {
        Reply::Failure(
            ApiError::new(
                ErrorCode::Unavailable,
                format!("binder session unavailable for {verb}"),
            )
            .to_payload(),
        )
    }
}
