//! Realtime relay for the admin behavior stream.
//!
//! Events posted by storefront pages are pushed to every open admin SSE
//! stream through a bounded `broadcast` channel. Subscribers that fall behind
//! skip what they missed.
//!
//! With `PostgreSQL` fan-out the hub publishes through `NOTIFY` instead, and a
//! listener task on every instance relays what it hears to its local streams,
//! so admins connected to different instances see the same events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Number of sample-bearing events kept for late joiners.
pub const RECENT_CAPACITY: usize = 40;

/// `NOTIFY` channel used for cross-instance fan-out.
pub const NOTIFY_CHANNEL: &str = "nudge_realtime";

const CHANNEL_CAPACITY: usize = 256;

// PostgreSQL rejects NOTIFY payloads of 8000 bytes or more.
const MAX_NOTIFY_PAYLOAD: usize = 7900;

const LISTENER_RETRY: Duration = Duration::from_secs(5);

/// Fan-out hub shared by the realtime routes.
#[derive(Clone)]
pub struct RealtimeHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    sender: broadcast::Sender<String>,
    recent: Mutex<VecDeque<Value>>,
    notify_pool: Option<PgPool>,
    closed: watch::Sender<bool>,
}

impl RealtimeHub {
    /// In-process fan-out only.
    #[must_use]
    pub fn local() -> Self {
        Self::build(None)
    }

    /// Fan-out through `PostgreSQL` `NOTIFY`. Pair with [`spawn_listener`].
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self::build(Some(pool))
    }

    fn build(notify_pool: Option<PgPool>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(HubInner {
                sender,
                recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)),
                notify_pool,
                closed,
            }),
        }
    }

    /// Ask every open stream to end, so graceful shutdown can finish.
    pub fn close(&self) {
        self.inner.closed.send_replace(true);
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static + use<> {
        let mut closed = self.inner.closed.subscribe();
        async move {
            // Err means the hub was dropped, which also ends the stream.
            let _ = closed.wait_for(|closed| *closed).await;
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// The last [`RECENT_CAPACITY`] sample-bearing events, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<Value> {
        self.inner
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Send `event` to every admin stream. Never fails; problems are logged.
    pub async fn publish(&self, event: Value) {
        let payload = event.to_string();

        if let Some(pool) = &self.inner.notify_pool {
            if payload.len() < MAX_NOTIFY_PAYLOAD {
                let sent = sqlx::query("SELECT pg_notify($1, $2)")
                    .bind(NOTIFY_CHANNEL)
                    .bind(&payload)
                    .execute(pool)
                    .await;
                match sent {
                    Ok(_) => return,
                    Err(e) => warn!(error = %e, "NOTIFY failed, relaying locally only"),
                }
            } else {
                warn!(bytes = payload.len(), "Event too large for NOTIFY, relaying locally only");
            }
        }

        self.deliver(payload, event);
    }

    fn deliver(&self, payload: String, event: Value) {
        if is_sample_bearing(&event) {
            let mut recent = self
                .inner
                .recent
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if recent.len() == RECENT_CAPACITY {
                recent.pop_front();
            }
            recent.push_back(event);
        }

        // Err only means no admin is connected.
        if self.inner.sender.send(payload).is_err() {
            debug!("No realtime subscribers");
        }
    }
}

fn is_sample_bearing(event: &Value) -> bool {
    event
        .as_object()
        .is_some_and(|o| ["scroll", "time", "clicks"].iter().any(|k| o.contains_key(*k)))
}

/// Relay `NOTIFY` payloads from every instance to this instance's streams.
///
/// Reconnects after a short pause when the listener connection drops.
pub fn spawn_listener(
    hub: RealtimeHub,
    pool: PgPool,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!(channel = NOTIFY_CHANNEL, "Starting realtime listener");
    tokio::spawn(async move {
        loop {
            let mut listener = match connect_listener(&pool).await {
                Ok(listener) => listener,
                Err(e) => {
                    warn!(error = %e, "Realtime listener connect failed");
                    tokio::select! {
                        () = tokio::time::sleep(LISTENER_RETRY) => continue,
                        _ = shutdown.changed() => break,
                    }
                }
            };

            loop {
                tokio::select! {
                    received = listener.recv() => match received {
                        Ok(notification) => {
                            let payload = notification.payload().to_owned();
                            match serde_json::from_str::<Value>(&payload) {
                                Ok(event) => hub.deliver(payload, event),
                                Err(e) => warn!(error = %e, "Dropping malformed realtime payload"),
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Realtime listener dropped, reconnecting");
                            break;
                        }
                    },
                    _ = shutdown.changed() => {
                        info!("Realtime listener stopped");
                        return;
                    }
                }
            }
        }
        info!("Realtime listener stopped");
    })
}

async fn connect_listener(pool: &PgPool) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(NOTIFY_CHANNEL).await?;
    Ok(listener)
}
