#![cfg(feature = "stream")]

use std::time::Duration;

use tokio_stream::StreamExt;

use noticekit::{AttributeMap, Center, DecodeError, EventName, Notification};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_collects_posts_from_spawned_producer() {
    let center = Center::new();
    let name = EventName::<u32>::new("stream-producer");
    let stream = center.stream(&name);

    let producer = center.clone();
    let posted = name.clone();
    tokio::task::spawn_blocking(move || {
        for i in 0..10 {
            producer.post(&posted, i);
        }
    })
    .await
    .unwrap();

    let values: Vec<u32> = stream
        .take(10)
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert_eq!(values, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn custom_decode_failure_ends_only_that_stream() {
    let center = Center::new();
    let strict = EventName::<u32>::with_decoder("stream-custom", |m: &AttributeMap| {
        m.boxed::<u32>("count").copied().map_err(|_| DecodeError::custom("count"))
    });
    let lenient = EventName::<u32>::new("stream-custom");

    let mut failing = center.stream(&strict);
    let mut surviving = center.stream(&lenient);

    center.hub().post(Notification::new("stream-custom", Some(AttributeMap::new())));
    center.post(&lenient, 5);

    assert!(failing.next().await.unwrap().unwrap_err().is_decode());
    assert!(failing.next().await.is_none());

    assert_eq!(surviving.next().await.unwrap().unwrap(), 5);
    assert_eq!(center.hub().listener_count(), 1);
}

#[tokio::test]
async fn signal_stream_never_fails() {
    let center = Center::new();
    let name = EventName::signal("stream-signal");
    let mut stream = center.stream(&name);

    center.notify(&name);
    center.hub().post(Notification::new("stream-signal", Some(AttributeMap::with_payload(1_u8))));

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_ok());
}

#[tokio::test]
async fn abandoning_iteration_unregisters() {
    let center = Center::new();
    let name = EventName::<u32>::new("stream-abandon");

    {
        let stream = center.stream(&name);
        center.post(&name, 1);
        let mut first = stream.take(1);
        assert_eq!(first.next().await.unwrap().unwrap(), 1);
        assert_eq!(center.hub().listener_count(), 1);
    }

    assert_eq!(center.hub().listener_count(), 0);
}

#[tokio::test]
async fn close_stops_pending_waits() {
    let center = Center::new();
    let name = EventName::<u32>::new("stream-close");
    let mut stream = center.stream(&name);

    stream.close();
    let next = tokio::time::timeout(Duration::from_millis(200), stream.next())
        .await
        .unwrap();
    assert!(next.is_none());
    assert_eq!(center.hub().listener_count(), 0);
}
