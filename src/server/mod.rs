//! HTTP and WebSocket surface for the notification log.
//!
//! Routes:
//! - `POST /topics/{topic}` appends one notification (body must be a JSON
//!   object).
//! - `GET /topics/{topic}?generationID=&fromIndex=` pages through history.
//! - `GET /{topic}/watch?generationID=&fromIndex=` upgrades to a watch
//!   session.

#[cfg(test)]
mod server_test;

use crate::ClientError;
use crate::Cursor;
use crate::Error;
use crate::NotificationStore;
use crate::Payload;
use crate::WatchManager;
use bytes::Bytes;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::http::StatusCode;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

#[derive(Debug)]
struct ApiError(Error);

impl warp::reject::Reject for ApiError {}

fn api_reject(err: impl Into<Error>) -> Rejection {
    warp::reject::custom(ApiError(err.into()))
}

/// Consumer cursor as it appears in the query string.
#[derive(Debug, Deserialize)]
struct CursorQuery {
    #[serde(rename = "generationID")]
    generation_id: Option<String>,
    #[serde(rename = "fromIndex")]
    from_index: Option<String>,
}

impl CursorQuery {
    fn into_cursor(self) -> std::result::Result<Cursor, ClientError> {
        let from_index = match self.from_index.as_deref() {
            // an absent or empty parameter means "from the beginning"
            None | Some("") => 0,
            Some(raw) => raw.parse::<u64>().map_err(|e| ClientError::InvalidParam {
                param: "fromIndex",
                reason: e.to_string(),
            })?,
        };
        Ok(Cursor {
            generation_id: self.generation_id.unwrap_or_default(),
            from_index,
        })
    }
}

/// Builds the full route tree over a store and watch manager.
pub fn routes<S: NotificationStore>(
    store: Arc<S>,
    watch_manager: Arc<WatchManager<S>>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let append = warp::path!("topics" / String)
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_store(Arc::clone(&store)))
        .and_then(handle_append);

    let history = warp::path!("topics" / String)
        .and(warp::get())
        .and(warp::query::<CursorQuery>())
        .and(with_store(store))
        .and_then(handle_history);

    let watch = warp::path!(String / "watch")
        .and(warp::query::<CursorQuery>())
        .and(warp::ws())
        .and(with_watch_manager(watch_manager))
        .and_then(handle_watch);

    append.or(history).or(watch).recover(handle_rejection)
}

/// Serves the API until the shutdown signal fires, then drains gracefully.
pub async fn serve<S: NotificationStore>(
    addr: SocketAddr,
    store: Arc<S>,
    watch_manager: Arc<WatchManager<S>>,
    mut shutdown: watch::Receiver<()>,
) {
    let (bound, server) = warp::serve(routes(store, watch_manager))
        .bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown.changed().await;
        });
    info!(address = %bound, "listening for requests");
    server.await;
    info!("server stopped");
}

fn with_store<S: NotificationStore>(
    store: Arc<S>,
) -> impl Filter<Extract = (Arc<S>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&store))
}

fn with_watch_manager<S: NotificationStore>(
    watch_manager: Arc<WatchManager<S>>,
) -> impl Filter<Extract = (Arc<WatchManager<S>>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&watch_manager))
}

async fn handle_append<S: NotificationStore>(
    topic: String,
    body: Bytes,
    store: Arc<S>,
) -> std::result::Result<impl Reply, Rejection> {
    let data: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| api_reject(ClientError::InvalidBody(e.to_string())))?;
    if !data.is_object() {
        return Err(api_reject(ClientError::InvalidBody(
            "expected a JSON object".to_string(),
        )));
    }

    store
        .append(&topic, Payload::Value(data))
        .map_err(api_reject)?;
    Ok(warp::reply())
}

async fn handle_history<S: NotificationStore>(
    topic: String,
    query: CursorQuery,
    store: Arc<S>,
) -> std::result::Result<impl Reply, Rejection> {
    let cursor = query.into_cursor().map_err(api_reject)?;
    let response = store
        .get(&topic, &cursor.generation_id, cursor.from_index)
        .map_err(api_reject)?;
    Ok(warp::reply::json(&response))
}

async fn handle_watch<S: NotificationStore>(
    topic: String,
    query: CursorQuery,
    ws: warp::ws::Ws,
    watch_manager: Arc<WatchManager<S>>,
) -> std::result::Result<impl Reply, Rejection> {
    let cursor = query.into_cursor().map_err(api_reject)?;
    Ok(ws.on_upgrade(move |socket| async move {
        watch_manager.run_session(socket, topic, cursor).await;
    }))
}

async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(ApiError(api_err)) = err.find::<ApiError>() {
        match api_err {
            Error::Client(client_err) => (StatusCode::BAD_REQUEST, client_err.to_string()),
            other => {
                error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else if let Some(invalid) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, invalid.to_string())
    } else {
        error!(?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };

    Ok(warp::reply::with_status(message, status))
}
