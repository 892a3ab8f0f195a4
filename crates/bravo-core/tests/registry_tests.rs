//! Integration tests for one-communicator-per-client enforcement


use bravo_core::*;
use test_utils::*;

async fn connect(
    transport: &MemoryTransport,
    registry: &ClientRegistry,
    name: &str,
) -> Result<Communicator<ChatMessage, String>> {
    let (handler, _inbox) = inbox();
    let config = CommunicatorConfig::new(CHANNEL, "g1".to_string()).with_name(name);
    Communicator::builder(config, handler)
        .connect(transport, registry)
        .await
}

#[tokio::test]
async fn test_second_communicator_on_same_client_fails() {
    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();
    let transport = hub.connect();

    let _first = connect(&transport, &registry, "first").await.unwrap();
    let err = connect(&transport, &registry, "second").await.err().unwrap();

    assert!(matches!(
        err,
        BravoError::DuplicateClient { ref transport } if transport == "memory-client-0"
    ));
    // The failed attempt never subscribed
    assert_eq!(hub.subscriber_count(CHANNEL), 1);
}

#[tokio::test]
async fn test_clones_of_a_transport_share_a_client() {
    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();
    let transport = hub.connect();
    let clone = transport.clone();

    let _first = connect(&transport, &registry, "first").await.unwrap();
    assert!(connect(&clone, &registry, "second").await.is_err());

    // A separate connection is a separate client
    let other = hub.connect();
    assert!(connect(&other, &registry, "third").await.is_ok());
}

#[tokio::test]
async fn test_client_reusable_after_drop() {
    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();
    let transport = hub.connect();

    let first = connect(&transport, &registry, "first").await.unwrap();
    assert!(registry.is_active(transport.client_id()));
    drop(first);
    assert!(!registry.is_active(transport.client_id()));

    let second = connect(&transport, &registry, "second").await.unwrap();
    second.shutdown().await;
    assert!(connect(&transport, &registry, "third").await.is_ok());
}

#[tokio::test]
async fn test_separate_registries_are_independent() {
    let hub = MemoryHub::new();
    let transport = hub.connect();

    let _a = connect(&transport, &ClientRegistry::new(), "a").await.unwrap();
    assert!(connect(&transport, &ClientRegistry::new(), "b").await.is_ok());
}
