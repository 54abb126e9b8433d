use super::*;
use crate::MockNotificationStore;
use crate::NotificationsResponse;
use crate::SledNotificationStore;
use crate::StorageConfig;
use crate::StorageError;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<SledNotificationStore> {
    let config = StorageConfig {
        path: dir.path().join("volume"),
        retention_secs: 3600,
        gc_interval_secs: 60,
    };
    Arc::new(SledNotificationStore::open(&config).expect("open store"))
}

fn test_api<S: NotificationStore>(
    store: Arc<S>,
    shutdown: watch::Receiver<()>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let manager = Arc::new(WatchManager::new(
        Arc::clone(&store),
        Duration::from_millis(40),
        shutdown,
    ));
    routes(store, manager)
}

#[test]
fn cursor_query_parses_values_and_defaults() {
    let cursor = CursorQuery {
        generation_id: Some("gen-1".to_string()),
        from_index: Some("7".to_string()),
    }
    .into_cursor()
    .expect("parse cursor");
    assert_eq!(cursor.generation_id, "gen-1");
    assert_eq!(cursor.from_index, 7);

    let cursor = CursorQuery {
        generation_id: None,
        from_index: None,
    }
    .into_cursor()
    .expect("parse cursor");
    assert_eq!(cursor.generation_id, "");
    assert_eq!(cursor.from_index, 0);

    // an empty parameter means "from the beginning", not an error
    let cursor = CursorQuery {
        generation_id: None,
        from_index: Some(String::new()),
    }
    .into_cursor()
    .expect("parse cursor");
    assert_eq!(cursor.from_index, 0);

    assert!(CursorQuery {
        generation_id: None,
        from_index: Some("-3".to_string()),
    }
    .into_cursor()
    .is_err());
}

#[tokio::test]
async fn append_then_history_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let api = test_api(Arc::clone(&store), shutdown_rx);

    let res = warp::test::request()
        .method("POST")
        .path("/topics/foo")
        .body(r#"{"a":1}"#)
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    assert!(res.body().is_empty());

    let res = warp::test::request()
        .path("/topics/foo?fromIndex=0")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);

    let response: NotificationsResponse = serde_json::from_slice(res.body()).expect("decode body");
    assert_eq!(response.generation_id, store.generation_id());
    assert_eq!(response.notifications.len(), 1);
    assert_eq!(response.notifications[0].index, 1);
    assert_eq!(
        response.notifications[0].data.to_value().unwrap(),
        json!({"a": 1})
    );

    // timestamps go over the wire as RFC 3339 strings
    let wire: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    let timestamp = wire["notifications"][0]["timestamp"]
        .as_str()
        .expect("timestamp is a string");
    assert!(timestamp.contains('T'));
}

#[tokio::test]
async fn rejects_non_object_body() {
    let dir = TempDir::new().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let api = test_api(open_store(&dir), shutdown_rx);

    for body in ["[1,2,3]", "\"text\"", "not json at all"] {
        let res = warp::test::request()
            .method("POST")
            .path("/topics/foo")
            .body(body)
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400, "body {:?} should be rejected", body);
        assert!(String::from_utf8_lossy(res.body()).contains("not a valid JSON object"));
    }
}

#[tokio::test]
async fn rejects_malformed_from_index() {
    let dir = TempDir::new().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let api = test_api(open_store(&dir), shutdown_rx);

    let res = warp::test::request()
        .path("/topics/foo?fromIndex=abc")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 400);
    assert!(String::from_utf8_lossy(res.body()).contains("invalid 'fromIndex'"));
}

#[tokio::test]
async fn unknown_topic_returns_empty_history() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let api = test_api(Arc::clone(&store), shutdown_rx);

    let res = warp::test::request().path("/topics/ghost").reply(&api).await;
    assert_eq!(res.status(), 200);

    let response: NotificationsResponse = serde_json::from_slice(res.body()).expect("decode body");
    assert_eq!(response.generation_id, store.generation_id());
    assert!(response.notifications.is_empty());
}

#[tokio::test]
async fn storage_failures_map_to_500() {
    let mut mock = MockNotificationStore::new();
    mock.expect_append().returning(|_, _| {
        Err(StorageError::Corruption {
            location: "append".to_string(),
        }
        .into())
    });
    mock.expect_get().returning(|_, _, _| {
        Err(StorageError::Corruption {
            location: "get".to_string(),
        }
        .into())
    });
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let api = test_api(Arc::new(mock), shutdown_rx);

    let res = warp::test::request()
        .method("POST")
        .path("/topics/foo")
        .body("{}")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 500);

    let res = warp::test::request().path("/topics/foo").reply(&api).await;
    assert_eq!(res.status(), 500);
}

#[tokio::test]
async fn rejects_unsupported_methods() {
    let dir = TempDir::new().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let api = test_api(open_store(&dir), shutdown_rx);

    let res = warp::test::request()
        .method("PUT")
        .path("/topics/foo")
        .body("{}")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 405);
}
