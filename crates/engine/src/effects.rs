//! Post-commit side effects.
//!
//! A committed transition returns a list of [`Effect`]s instead of sending
//! anything itself. The [`EffectDispatcher`] delivers them afterwards through
//! the two outbound seams, [`NotificationSink`] and [`Broadcaster`]. Delivery
//! is best-effort: a failure is logged and counted, never returned to the
//! caller of the transition.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{EngineError, NotificationKind};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Notify {
        user_id: String,
        message: String,
        kind: NotificationKind,
    },
    Broadcast {
        room: String,
        event: String,
        payload: Value,
    },
}

/// Failure reported by a sink or broadcaster.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SinkError(pub String);

impl From<EngineError> for SinkError {
    fn from(err: EngineError) -> Self {
        Self(err.to_string())
    }
}

/// Delivers a message to a user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), SinkError>;
}

/// Pushes an event to every client subscribed to `room`.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn emit(&self, room: &str, event: &str, payload: &Value) -> Result<(), SinkError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct EffectDispatcher {
    sink: Arc<dyn NotificationSink>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl fmt::Debug for EffectDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDispatcher").finish_non_exhaustive()
    }
}

impl EffectDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { sink, broadcaster }
    }

    /// Deliver every effect in order. One failing effect does not stop the
    /// others.
    pub async fn dispatch(&self, effects: &[Effect]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for effect in effects {
            let outcome = match effect {
                Effect::Notify {
                    user_id,
                    message,
                    kind,
                } => self.sink.notify(user_id, message, *kind).await,
                Effect::Broadcast {
                    room,
                    event,
                    payload,
                } => self.broadcaster.emit(room, event, payload).await,
            };
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(?effect, "effect delivery failed: {err}");
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl NotificationSink for Recorder {
        async fn notify(
            &self,
            user_id: &str,
            _message: &str,
            _kind: NotificationKind,
        ) -> Result<(), SinkError> {
            if self.fail_for.as_deref() == Some(user_id) {
                return Err(SinkError("mailbox full".to_string()));
            }
            self.seen.lock().unwrap().push(user_id.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl Broadcaster for Recorder {
        async fn emit(&self, room: &str, _event: &str, _payload: &Value) -> Result<(), SinkError> {
            self.seen.lock().unwrap().push(room.to_string());
            Ok(())
        }
    }

    fn notify(user_id: &str) -> Effect {
        Effect::Notify {
            user_id: user_id.to_string(),
            message: "hi".to_string(),
            kind: NotificationKind::Booking,
        }
    }

    #[tokio::test]
    async fn failures_are_counted_and_do_not_stop_delivery() {
        let recorder = Arc::new(Recorder {
            fail_for: Some("bob".to_string()),
            ..Recorder::default()
        });
        let dispatcher = EffectDispatcher::new(recorder.clone(), recorder.clone());

        let report = dispatcher
            .dispatch(&[
                notify("bob"),
                notify("alice"),
                Effect::Broadcast {
                    room: "global".to_string(),
                    event: "ping".to_string(),
                    payload: Value::Null,
                },
            ])
            .await;

        assert_eq!(
            report,
            DispatchReport {
                delivered: 2,
                failed: 1
            }
        );
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["alice", "global"]);
    }
}
