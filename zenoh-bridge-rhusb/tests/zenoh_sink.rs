//! End-to-end tests of the Zenoh sink.
//!
//! Note: Zenoh requires multi-thread tokio runtime.
//! Each test uses a unique key prefix to avoid interference.

use std::time::Duration;

use sensorbridge_common::{Reading, ReadingPayload, ZenohConfig};
use zenoh_bridge_rhusb::{PublishMessage, Sink, SinkError, SinkEvent, ZenohSink};

/// Generate a unique test prefix to avoid test interference.
fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}", nanos)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_peer_sink_reports_connected_and_publishes() {
    let topic = format!("{}/nuc/temperature", unique_prefix());

    let (sink, mut events) = ZenohSink::connect(&ZenohConfig::default(), Duration::from_millis(50))
        .await
        .expect("Failed to open Zenoh sink");

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timeout waiting for sink event")
        .expect("Event channel closed");
    assert_eq!(event, SinkEvent::Connected);

    let subscriber = sink
        .session()
        .declare_subscriber(&topic)
        .await
        .expect("Failed to create subscriber");

    // Give subscriber time to set up
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reading = Reading::now("45", "22");
    sink.put(PublishMessage::new(topic.clone(), reading.to_json().unwrap()))
        .await
        .expect("Failed to publish");

    let sample = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for sample")
        .expect("Subscriber closed");

    let payload = ReadingPayload::from_json(&sample.payload().to_bytes()).unwrap();
    assert_eq!(payload.humidity, "45");
    assert_eq!(payload.temperature, "22");

    // No further events while connectivity is stable
    let quiet = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
    assert!(quiet.is_err());

    sink.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_put_reports_error_and_reannounces() {
    let (sink, mut events) = ZenohSink::connect(&ZenohConfig::default(), Duration::from_millis(50))
        .await
        .expect("Failed to open Zenoh sink");

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timeout waiting for sink event")
        .expect("Event channel closed");
    assert_eq!(first, SinkEvent::Connected);

    // An invalid key expression makes the put fail
    let result = sink
        .put(PublishMessage::new("bad//key", b"{}".to_vec()))
        .await;
    assert!(matches!(result, Err(SinkError::Send { .. })));

    let error = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timeout waiting for error event")
        .expect("Event channel closed");
    assert!(matches!(error, SinkEvent::Error(_)));

    // The monitor announces the session again on its next check
    let again = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timeout waiting for reconnect")
        .expect("Event channel closed");
    assert_eq!(again, SinkEvent::Connected);

    sink.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_credentials_fail_connect() {
    let config = ZenohConfig {
        mode: "client".to_string(),
        connect: vec!["tls/localhost:7447".to_string()],
        tls: Some(sensorbridge_common::TlsConfig {
            root_ca_certificate: Some("/nonexistent/rootca.pem".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };

    let result = ZenohSink::connect(&config, Duration::from_secs(1)).await;
    assert!(matches!(
        result,
        Err(sensorbridge_common::Error::Credential { .. })
    ));
}
