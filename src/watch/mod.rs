//! Watch sessions: push-style incremental delivery built purely on top of
//! the store's pull-based read contract.


use crate::NotificationStore;
use crate::SessionError;
use futures::stream::SplitSink;
use futures::stream::SplitStream;
use futures::SinkExt;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use warp::ws::Message;
use warp::ws::WebSocket;

/// Close code sent when a session terminates abnormally.
const SESSION_ERROR_CLOSE_CODE: u16 = 1011;

/// A consumer's remembered position into a topic's log: the last generation
/// ID it observed and the next index it wants.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    pub generation_id: String,
    pub from_index: u64,
}

/// Runs one independent polling loop per live connection, delivering new
/// notifications at a fixed cadence. Sessions share only the store's `get`
/// contract, which is safe for concurrent callers.
pub struct WatchManager<S> {
    store: Arc<S>,
    push_interval: Duration,
    shutdown: watch::Receiver<()>,
}

impl<S: NotificationStore> WatchManager<S> {
    pub fn new(store: Arc<S>, push_interval: Duration, shutdown: watch::Receiver<()>) -> Self {
        Self {
            store,
            push_interval,
            shutdown,
        }
    }

    /// Owns one connection for its lifetime. Terminates on peer disconnect,
    /// a failed read, or process shutdown; none of these outlive the
    /// session.
    pub async fn run_session(&self, socket: WebSocket, topic: String, cursor: Cursor) {
        info!(topic = %topic, from_index = cursor.from_index, "watch session started");
        let (mut sink, mut stream) = socket.split();

        match self.poll_loop(&mut sink, &mut stream, &topic, cursor).await {
            Ok(()) => info!(topic = %topic, "watch session closed"),
            Err(SessionError::PeerClosed) => info!(topic = %topic, "watch session ended, peer closed"),
            Err(e) => warn!(topic = %topic, error = %e, "watch session ended"),
        }
    }

    async fn poll_loop(
        &self,
        sink: &mut SplitSink<WebSocket, Message>,
        stream: &mut SplitStream<WebSocket>,
        topic: &str,
        mut cursor: Cursor,
    ) -> std::result::Result<(), SessionError> {
        let mut shutdown = self.shutdown.clone();

        loop {
            let response = match self.store.get(topic, &cursor.generation_id, cursor.from_index) {
                Ok(response) => response,
                Err(e) => {
                    error!(topic, error = %e, "closing watch session after failed read");
                    let _ = sink
                        .send(Message::close_with(SESSION_ERROR_CLOSE_CODE, e.to_string()))
                        .await;
                    return Err(SessionError::StoreRead(e.to_string()));
                }
            };

            if let Some(last) = response.notifications.last() {
                // Resume one past the delivered batch: the store's read is
                // inclusive of from_index. The response's generation ID is
                // adopted so a mid-session storage reset is picked up on the
                // next iteration.
                let next = Cursor {
                    generation_id: response.generation_id.clone(),
                    from_index: last.index + 1,
                };
                let frame = serde_json::to_string(&response)
                    .map_err(|e| SessionError::Send(e.to_string()))?;
                sink.send(Message::text(frame))
                    .await
                    .map_err(|e| SessionError::Send(e.to_string()))?;
                cursor = next;
            }

            // Wait out the full interval. Inbound frames are drained without
            // tightening the cadence; only a close or error ends the wait
            // early.
            let sleep = tokio::time::sleep(self.push_interval);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        let _ = sink.send(Message::close()).await;
                        return Ok(());
                    }
                    _ = &mut sleep => break,
                    frame = stream.next() => match frame {
                        None => return Err(SessionError::PeerClosed),
                        Some(Err(e)) => return Err(SessionError::Receive(e.to_string())),
                        Some(Ok(msg)) if msg.is_close() => return Err(SessionError::PeerClosed),
                        Some(Ok(_)) => {}
                    },
                }
            }
        }
    }
}
