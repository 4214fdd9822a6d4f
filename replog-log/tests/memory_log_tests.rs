use pretty_assertions::assert_eq;
use replog_log::{EventLog, EventLogConfig, InMemoryEventLog, LogError};
use replog_types::{AggregateId, DurableEvent, EmitterId, LogId, VectorClock};

fn log(id: &str) -> InMemoryEventLog<String> {
    InMemoryEventLog::new(LogId::from(id))
}

fn event(payload: &str) -> DurableEvent<String> {
    DurableEvent::new(payload.to_string(), EmitterId::from("writer"))
}

fn routed(payload: &str, aggregate: &str) -> DurableEvent<String> {
    event(payload).with_emitter_aggregate_id(AggregateId::from(aggregate))
}

// ── append ───────────────────────────────────────────────────────

#[tokio::test]
async fn append_assigns_increasing_sequence_numbers() {
    let log = log("L1");
    let first = log.append(event("a")).await.unwrap();
    let second = log.append(event("b")).await.unwrap();

    assert_eq!(first.local_sequence_nr(), 1);
    assert_eq!(second.local_sequence_nr(), 2);
    assert_eq!(log.sequence_nr().await, 2);
    assert_eq!(log.len().await, 2);
}

#[tokio::test]
async fn append_makes_log_the_causal_originator() {
    let log = log("L1");
    let stored = log.append(event("a")).await.unwrap();

    assert_eq!(stored.process_id(), Some(&LogId::from("L1")));
    assert_eq!(stored.local_log_id(), Some(&LogId::from("L1")));
    assert_eq!(stored.vector_timestamp().get(&LogId::from("L1")), 1);
    assert!(stored.system_timestamp() > 0);
}

#[tokio::test]
async fn local_writes_are_causally_ordered() {
    let log = log("L1");
    let first = log.append(event("a")).await.unwrap();
    let second = log.append(event("b")).await.unwrap();
    assert!(first.vector_timestamp().is_before(second.vector_timestamp()));
}

#[tokio::test]
async fn local_write_after_replicated_event_depends_on_it() {
    let origin = log("L1");
    let replica = log("L2");
    let remote = origin.append(event("remote")).await.unwrap();
    replica.write_replicated(vec![remote.clone()]).await.unwrap();

    let local = replica.append(event("local")).await.unwrap();
    assert!(remote.vector_timestamp().is_before(local.vector_timestamp()));
    assert_eq!(local.vector_timestamp().get(&LogId::from("L1")), 1);
    assert_eq!(local.vector_timestamp().get(&LogId::from("L2")), 2);
}

#[tokio::test]
async fn version_tracks_stored_events() {
    let log = log("L1");
    assert!(log.version().await.is_empty());
    log.append(event("a")).await.unwrap();
    log.append(event("b")).await.unwrap();
    let expected: VectorClock = [("L1", 2)].into_iter().collect();
    assert_eq!(log.version().await, expected);
}

#[tokio::test]
async fn append_beyond_capacity_fails_without_storing() {
    let log: InMemoryEventLog<String> = InMemoryEventLog::with_config(
        LogId::from("L1"),
        EventLogConfig { capacity: Some(1) },
    );
    log.append(event("a")).await.unwrap();

    let err = log.append(event("b")).await.unwrap_err();
    assert!(matches!(err, LogError::CapacityExceeded { capacity: 1, .. }));
    assert_eq!(log.len().await, 1);
    assert_eq!(log.sequence_nr().await, 1);
}

#[tokio::test]
async fn closed_log_rejects_appends_and_subscriptions() {
    let log = log("L1");
    log.close().await;
    assert!(matches!(log.append(event("a")).await, Err(LogError::Closed(_))));
    assert!(matches!(log.subscribe(None).await, Err(LogError::Closed(_))));
}

// ── read ─────────────────────────────────────────────────────────

#[tokio::test]
async fn read_returns_range_from_sequence_number() {
    let log = log("L1");
    for p in ["a", "b", "c", "d"] {
        log.append(event(p)).await.unwrap();
    }
    let batch = log.read(2, 2).await;
    let payloads: Vec<&str> = batch.iter().map(|e| e.payload().as_str()).collect();
    assert_eq!(payloads, vec!["b", "c"]);
    assert!(log.read(5, 10).await.is_empty());
}

#[tokio::test]
async fn read_far_past_the_end_is_empty() {
    let log = log("L1");
    log.append(event("a")).await.unwrap();

    assert!(log.read(u64::MAX, 10).await.is_empty());
    assert!(log.read(u64::from(u32::MAX) + 2, 10).await.is_empty());
    assert_eq!(log.read(0, 10).await.len(), 1);
}

// ── subscribe ────────────────────────────────────────────────────

#[tokio::test]
async fn writer_receives_its_own_events() {
    let log = log("L1");
    let mut stream = log.subscribe(None).await.unwrap();
    let stored = log.append(event("a")).await.unwrap();
    assert_eq!(stream.recv().await, Some(stored));
}

#[tokio::test]
async fn subscription_replays_stored_events_first() {
    let log = log("L1");
    log.append(event("old")).await.unwrap();
    let mut stream = log.subscribe(None).await.unwrap();
    log.append(event("new")).await.unwrap();

    assert_eq!(stream.recv().await.unwrap().payload(), "old");
    assert_eq!(stream.recv().await.unwrap().payload(), "new");
}

#[tokio::test]
async fn aggregate_subscriber_receives_only_routed_events() {
    let log = log("L1");
    let mut only_a = log.subscribe(Some(AggregateId::from("A"))).await.unwrap();
    let mut everything = log.subscribe(None).await.unwrap();

    log.append(routed("for-a", "A")).await.unwrap();
    log.append(routed("for-b", "B")).await.unwrap();
    log.append(
        routed("for-b-and-a", "B").with_custom_destination_aggregate_ids([AggregateId::from("A")]),
    )
    .await
    .unwrap();

    assert_eq!(only_a.recv().await.unwrap().payload(), "for-a");
    assert_eq!(only_a.recv().await.unwrap().payload(), "for-b-and-a");
    assert!(only_a.try_recv().is_none());

    for expected in ["for-a", "for-b", "for-b-and-a"] {
        assert_eq!(everything.recv().await.unwrap().payload(), expected);
    }
}

#[tokio::test]
async fn dropped_subscriber_does_not_block_delivery() {
    let log = log("L1");
    let dropped = log.subscribe(None).await.unwrap();
    drop(dropped);
    let mut live = log.subscribe(None).await.unwrap();

    log.append(event("a")).await.unwrap();
    assert_eq!(live.recv().await.unwrap().payload(), "a");
}

#[tokio::test]
async fn close_ends_subscription_streams() {
    let log = log("L1");
    let mut stream = log.subscribe(None).await.unwrap();
    log.close().await;
    assert_eq!(stream.recv().await, None);
}

// ── write_replicated ─────────────────────────────────────────────

#[tokio::test]
async fn replicated_copy_keeps_causal_identity() {
    let origin = log("L1");
    let replica = log("L2");
    replica.append(event("local")).await.unwrap();
    let original = origin.append(event("a")).await.unwrap();

    let stored = replica.write_replicated(vec![original.clone()]).await.unwrap();
    assert_eq!(stored.len(), 1);
    let copy = &stored[0];
    assert_eq!(copy.causal_id(), original.causal_id());
    assert_eq!(copy.local_log_id(), Some(&LogId::from("L2")));
    assert_eq!(copy.local_sequence_nr(), 2);
}

#[tokio::test]
async fn replicated_events_already_known_are_skipped() {
    let origin = log("L1");
    let replica = log("L2");
    let original = origin.append(event("a")).await.unwrap();

    replica.write_replicated(vec![original.clone()]).await.unwrap();
    let again = replica
        .write_replicated(vec![original.clone(), original])
        .await
        .unwrap();
    assert!(again.is_empty());
    assert_eq!(replica.len().await, 1);
}

#[tokio::test]
async fn replicated_events_are_delivered_to_subscribers() {
    let origin = log("L1");
    let replica = log("L2");
    let mut stream = replica.subscribe(None).await.unwrap();
    let original = origin.append(event("a")).await.unwrap();

    replica.write_replicated(vec![original.clone()]).await.unwrap();
    let delivered = stream.recv().await.unwrap();
    assert_eq!(delivered.causal_id(), original.causal_id());
}

#[tokio::test]
async fn unprepared_events_cannot_be_replicated() {
    let replica = log("L2");
    let err = replica.write_replicated(vec![event("a")]).await.unwrap_err();
    assert!(matches!(err, LogError::InvalidEvent(_)));
}

#[tokio::test]
async fn replicated_batch_over_capacity_writes_nothing() {
    let origin = log("L1");
    let replica: InMemoryEventLog<String> = InMemoryEventLog::with_config(
        LogId::from("L2"),
        EventLogConfig { capacity: Some(1) },
    );
    let a = origin.append(event("a")).await.unwrap();
    let b = origin.append(event("b")).await.unwrap();

    assert!(replica.write_replicated(vec![a, b]).await.is_err());
    assert!(replica.is_empty().await);
}
