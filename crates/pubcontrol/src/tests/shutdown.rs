//! Shutdown lifecycle of an endpoint client.

use super::harness::{Outcomes, RecordingTransport, TestFormat};
use crate::{Item, PubControlClient, PubControlError, WorkerState};
use std::sync::Arc;
use std::time::Duration;

fn client(transport: &Arc<RecordingTransport>) -> PubControlClient {
    PubControlClient::builder("https://x/")
        .transport(transport.clone())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_finish_without_publishes_returns_immediately() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&transport);

    tokio::time::timeout(Duration::from_secs(1), client.finish())
        .await
        .unwrap();

    assert_eq!(client.worker_state(), WorkerState::Stopped);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_second_finish_is_a_noop() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&transport);

    client
        .publish_async("c", &Item::new(TestFormat::body("hi")), None)
        .unwrap();
    client.finish().await;
    client.finish().await;

    assert_eq!(transport.total_items(), 1);
    assert_eq!(client.worker_state(), WorkerState::Stopped);
}

#[tokio::test]
async fn test_stop_drains_queued_requests_first() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&transport);
    let outcomes = Outcomes::default();

    for _ in 0..5 {
        let sink = outcomes.clone();
        client
            .publish_async(
                "c",
                &Item::new(TestFormat::body("hi")),
                Some(Box::new(move |ok, msg| sink.lock().push((ok, msg)))),
            )
            .unwrap();
    }
    client.wait_all_sent().await;

    assert_eq!(transport.total_items(), 5);
    assert_eq!(outcomes.lock().len(), 5);
    assert!(outcomes.lock().iter().all(|(ok, _)| *ok));
}

#[tokio::test]
async fn test_publishing_after_shutdown_is_closed() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&transport);
    client.wait_all_sent().await;

    let item = Item::new(TestFormat::body("hi"));
    assert!(matches!(
        client.publish_async("c", &item, None),
        Err(PubControlError::Closed)
    ));
    assert!(matches!(
        client.publish("c", &item).await,
        Err(PubControlError::Closed)
    ));
    assert!(transport.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_finishes_all_return() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&transport);

    for _ in 0..20 {
        client
            .publish_async("c", &Item::new(TestFormat::body("hi")), None)
            .unwrap();
    }

    let finishes = (0..4).map(|_| {
        let client = client.clone();
        tokio::spawn(async move { client.finish().await })
    });
    for result in futures::future::join_all(finishes).await {
        result.unwrap();
    }

    assert_eq!(transport.total_items(), 20);
    assert_eq!(client.worker_state(), WorkerState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_publishes_spawn_one_worker() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&transport);

    let publishers = (0..8).map(|_| {
        let client = client.clone();
        tokio::spawn(async move {
            for _ in 0..10 {
                client
                    .publish_async("c", &Item::new(TestFormat::body("hi")), None)
                    .unwrap();
            }
        })
    });
    for result in futures::future::join_all(publishers).await {
        result.unwrap();
    }
    client.finish().await;

    assert_eq!(transport.total_items(), 80);
    assert!(transport.batch_sizes().iter().all(|n| *n <= 10));
}

async fn wait_for_items(transport: &RecordingTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while transport.total_items() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_worker_survives_panicking_callback() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&transport);

    client
        .publish_async(
            "c",
            &Item::new(TestFormat::body("first")),
            Some(Box::new(|_, _| panic!("callback failure"))),
        )
        .unwrap();
    wait_for_items(&transport, 1).await;

    let outcomes = Outcomes::default();
    let sink = outcomes.clone();
    client
        .publish_async(
            "c",
            &Item::new(TestFormat::body("second")),
            Some(Box::new(move |ok, msg| sink.lock().push((ok, msg)))),
        )
        .unwrap();
    wait_for_items(&transport, 2).await;

    assert_eq!(client.pending(), 0);
    client.wait_all_sent().await;
    assert_eq!(*outcomes.lock(), vec![(true, String::new())]);
}
