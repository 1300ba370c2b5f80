//! ReconnectingClient against a live hub.

mod common;

use chrono::Utc;
use common::{eventually, make_state, spawn_hub, ws_url, ScriptedSource};
use parking_lot::Mutex;
use pulse::client::{
    ClientError, ClientHandler, ConnectionState, IncomingMessage, ReconnectPolicy,
    ReconnectingClient,
};
use pulse::config::PulseConfig;
use pulse::telemetry::MetricKind;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    opens: Mutex<usize>,
    closes: Mutex<usize>,
    messages: Mutex<Vec<Value>>,
    errors: Mutex<Vec<ClientError>>,
}

impl Recorder {
    fn types(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| m["type"].as_str().map(str::to_string))
            .collect()
    }
}

impl ClientHandler for Recorder {
    fn on_open(&self) {
        *self.opens.lock() += 1;
    }

    fn on_message(&self, message: IncomingMessage) {
        if let IncomingMessage::Json(value) = message {
            self.messages.lock().push(value);
        }
    }

    fn on_close(&self) {
        *self.closes.lock() += 1;
    }

    fn on_error(&self, error: &ClientError) {
        self.errors.lock().push(error.clone());
    }
}

#[tokio::test]
async fn test_client_receives_pushes_for_subscribed_channel() {
    let source = ScriptedSource::constant(MetricKind::HostMetrics, json!({ "cpu": 42 }));
    let state = make_state(PulseConfig::default(), vec![source]);
    let addr = spawn_hub(state.clone()).await;

    let recorder = Arc::new(Recorder::default());
    let client = ReconnectingClient::websocket(
        ws_url(addr),
        recorder.clone(),
        ReconnectPolicy::default(),
    );
    client.connect().await;
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.subscribe("metrics"));

    let seen = recorder.clone();
    eventually(|| {
        let seen = seen.clone();
        async move { seen.types().contains(&"subscribed".to_string()) }
    })
    .await;

    state
        .scheduler
        .tick(MetricKind::HostMetrics, Utc::now())
        .await;

    let seen = recorder.clone();
    eventually(|| {
        let seen = seen.clone();
        async move { seen.types().contains(&"metrics_update".to_string()) }
    })
    .await;

    let update = recorder
        .messages
        .lock()
        .iter()
        .find(|m| m["type"] == "metrics_update")
        .cloned()
        .unwrap();
    assert_eq!(update["data"]["cpu"], 42);
    assert_eq!(recorder.types()[0], "connected");
    assert_eq!(*recorder.opens.lock(), 1);

    client.disconnect();
    assert_eq!(*recorder.closes.lock(), 1);

    let registry = state.manager.registry().clone();
    eventually(|| {
        let registry = registry.clone();
        async move { registry.client_count().await == 0 }
    })
    .await;
}

#[tokio::test]
async fn test_client_gives_up_when_hub_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let recorder = Arc::new(Recorder::default());
    let client = ReconnectingClient::websocket(
        ws_url(addr),
        recorder.clone(),
        ReconnectPolicy {
            delay: Duration::from_millis(20),
            max_attempts: 2,
        },
    );
    client.connect().await;

    let seen = recorder.clone();
    eventually(|| {
        let seen = seen.clone();
        async move {
            seen
                .errors
                .lock()
                .iter()
                .any(|e| matches!(e, ClientError::RetriesExhausted { .. }))
        }
    })
    .await;

    assert_eq!(*recorder.opens.lock(), 0);
    assert!(!client.reconnect_pending());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(recorder
        .errors
        .lock()
        .iter()
        .any(|e| matches!(e, ClientError::Connect { .. })));
}
