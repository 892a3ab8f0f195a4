//! Integration tests for the join gate and communicator lifecycle


use bravo_core::*;
use test_utils::*;
use tokio::time::{Duration, Instant};

// ----------------------------------------------------------------------------
// Join Gate
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_send_times_out_when_join_never_completes() {
    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();
    let transport = hub.connect_with(MemoryTransportConfig::never_joins());
    let (handler, _inbox) = inbox();

    let config = CommunicatorConfig::new(CHANNEL, "g1".to_string())
        .with_name("stuck")
        .with_join_timeout(Duration::from_secs(3));
    let stuck: Communicator<ChatMessage, String> = Communicator::builder(config, handler)
        .connect(&transport, &registry)
        .await
        .unwrap();
    assert_eq!(stuck.join_state(), JoinState::Joining);

    let started = Instant::now();
    let err = stuck.broadcast(&chat("anyone?")).await.unwrap_err();
    assert!(matches!(err, BravoError::JoinTimeout { waited_ms: 3000 }));
    assert!(started.elapsed() >= Duration::from_secs(3));

    // Nothing was published, not even an announcement
    assert!(hub.published(CHANNEL).is_empty());
    assert!(matches!(
        stuck.wait_joined().await,
        Err(BravoError::JoinTimeout { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_direct_send_times_out_when_join_never_completes() {
    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();
    let transport = hub.connect_with(MemoryTransportConfig::never_joins());
    let (handler, _inbox) = inbox();

    let config = CommunicatorConfig::new(CHANNEL, "g1".to_string())
        .with_name("stuck")
        .with_join_timeout(Duration::from_millis(1500));
    let stuck: Communicator<ChatMessage, String> = Communicator::builder(config, handler)
        .connect(&transport, &registry)
        .await
        .unwrap();

    // An explicit identifier skips the peer lookup and goes straight to the gate
    let started = Instant::now();
    let err = stuck
        .send_to(&chat("hello bob"), remote("bob", "g1"))
        .await
        .unwrap_err();
    assert!(matches!(err, BravoError::JoinTimeout { waited_ms: 1500 }));
    assert!(started.elapsed() >= Duration::from_millis(1500));

    assert!(hub.published(CHANNEL).is_empty());
    assert_eq!(stuck.join_state(), JoinState::Joining);
}

#[tokio::test(start_paused = true)]
async fn test_send_waits_for_delayed_join() {
    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();

    let mut listener = TestPeer::join(&hub, &registry, "listener", "g1").await;
    listener.communicator.wait_joined().await.unwrap();

    let slow = TestPeer::join_with(
        &hub,
        &registry,
        "slow",
        "g1",
        MemoryTransportConfig::delayed(Duration::from_millis(800)),
    )
    .await;
    assert!(!slow.communicator.is_joined());

    let started = Instant::now();
    slow.communicator.broadcast(&chat("finally")).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(800));
    assert!(slow.communicator.is_joined());

    assert_eq!(listener.next_delivery().await.payload, chat("finally"));

    // The announcement precedes the message on the wire
    let sent = published_envelopes(&hub, &slow.client_id);
    assert!(matches!(
        sent.as_slice(),
        [Envelope::Announcement(_), Envelope::Direct(_)]
    ));
}

#[tokio::test]
async fn test_repeated_presence_signal_announces_once() {
    let transport = ManualTransport::new("manual-1");
    let (me, _inbox, _errors) = manual_peer(&transport, "me", "g1").await;
    assert_eq!(me.join_state(), JoinState::Joining);

    transport.push(ChannelEvent::PresenceFull);
    me.wait_joined().await.unwrap();
    transport.push(ChannelEvent::PresenceFull);
    settle().await;

    let announcements = transport
        .published()
        .into_iter()
        .filter(|envelope| matches!(envelope, Envelope::Announcement(_)))
        .count();
    assert_eq!(announcements, 1);
    assert_eq!(me.join_state(), JoinState::Joined);
}

#[tokio::test]
async fn test_failed_announcement_is_reported() {
    let transport = ManualTransport::failing("manual-1");
    let (me, _inbox, errors) = manual_peer(&transport, "me", "g1").await;

    transport.push(ChannelEvent::PresenceFull);
    me.wait_joined().await.unwrap();
    settle().await;

    assert_eq!(errors.messages().len(), 1);
    assert!(errors.messages()[0].contains("link down"));

    // Application sends surface the failure to the caller instead
    let err = me.broadcast(&chat("x")).await.unwrap_err();
    assert!(matches!(
        err,
        BravoError::Transport(TransportError::PublishFailed { .. })
    ));
    assert_eq!(errors.messages().len(), 1);
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_invalid_config_is_rejected_before_subscribing() {
    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();
    let transport = hub.connect();
    let (handler, _inbox) = inbox();

    let result: Result<Communicator<ChatMessage, String>> =
        Communicator::builder(CommunicatorConfig::new("", "g1".to_string()), handler)
            .connect(&transport, &registry)
            .await;

    assert!(matches!(result, Err(BravoError::Configuration { .. })));
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn test_shutdown_stops_event_loop() {
    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();

    let alice = TestPeer::join(&hub, &registry, "alice", "g1").await;
    alice.communicator.wait_joined().await.unwrap();
    assert_eq!(hub.subscriber_count(CHANNEL), 1);

    alice.communicator.shutdown().await;
    assert_eq!(hub.subscriber_count(CHANNEL), 0);
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn test_channel_name_and_signer() {
    let transport = ManualTransport::new("manual-1");
    let (me, _inbox, _errors) = manual_peer(&transport, "me", "g7").await;

    assert_eq!(me.channel_name(), CHANNEL);
    assert_eq!(me.signer().name(), Some("me"));
    assert_eq!(me.signer().group(), "g7");
    assert_eq!(me.signer().display_key(), "me");

    // Event stream ending leaves the communicator usable for queries
    transport.disconnect();
    settle().await;
    assert!(me.peers().await.is_empty());
}
