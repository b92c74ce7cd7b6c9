//! Server-to-client notification stream.
//!
//! Each opened stream announces the handshake, then the current catalog, then
//! a liveness ping every period until it is dropped. Dropping the stream (peer
//! disconnect or shutdown) stops the timer and releases the connection.

use std::{sync::Arc, time::Duration};

use chrono::{SecondsFormat, Utc};
use futures_util::{stream, Stream};
use serde_json::json;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

use crate::mcp::{dispatcher::Dispatcher, rpc::Notification};

pub const HANDSHAKE_METHOD: &str = "notifications/initialized";
pub const TOOLS_CHANGED_METHOD: &str = "notifications/tools_changed";
pub const PING_METHOD: &str = "notifications/ping";

enum Phase {
    Handshake,
    Catalog,
    Heartbeat(Interval),
}

/// Logs the release of a stream when its state is dropped.
struct StreamGuard {
    stream_id: Uuid,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        info!(stream_id = %self.stream_id, "push stream released");
    }
}

struct PushState {
    phase: Phase,
    dispatcher: Arc<Dispatcher>,
    period: Duration,
    _guard: StreamGuard,
}

pub fn open(dispatcher: Arc<Dispatcher>, period: Duration) -> impl Stream<Item = Notification> {
    let stream_id = Uuid::new_v4();
    info!(stream_id = %stream_id, "push stream opened");

    let state = PushState {
        phase: Phase::Handshake,
        dispatcher,
        period,
        _guard: StreamGuard { stream_id },
    };

    stream::unfold(state, |mut state| async move {
        let notification = match state.phase {
            Phase::Handshake => {
                state.phase = Phase::Catalog;
                Notification::new(HANDSHAKE_METHOD, state.dispatcher.handshake())
            }
            Phase::Catalog => {
                let mut ticker = time::interval_at(Instant::now() + state.period, state.period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                state.phase = Phase::Heartbeat(ticker);
                Notification::new(TOOLS_CHANGED_METHOD, state.dispatcher.tool_listing())
            }
            Phase::Heartbeat(ref mut ticker) => {
                ticker.tick().await;
                Notification::new(
                    PING_METHOD,
                    json!({ "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true) }),
                )
            }
        };
        Some((notification, state))
    })
}
