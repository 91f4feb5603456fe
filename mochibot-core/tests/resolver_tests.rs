// tests/resolver_tests.rs

use std::sync::atomic::Ordering;
use std::sync::Arc;

use mochibot_core::identity::LidResolver;
use mochibot_core::test_utils::helpers::{participant, RecordingClient};

const GROUP: &str = "1203630-1111@g.us";

fn client_with_member() -> Arc<RecordingClient> {
    let client = Arc::new(RecordingClient::new("999@s.whatsapp.net"));
    client.add_group(
        GROUP,
        "resolver test",
        vec![
            participant("111@s.whatsapp.net", None),
            participant("222@s.whatsapp.net", None),
        ],
    );
    client.add_contact("111@s.whatsapp.net", Some("777001@lid"));
    client.add_contact("222@s.whatsapp.net", Some("777002@lid"));
    client
}

#[tokio::test]
async fn non_linked_input_passes_through_without_queries() {
    let client = client_with_member();
    let resolver = LidResolver::new(client.clone());

    // A bare number outside any group context becomes a best-effort
    // direct-domain identity, with zero roster fetches.
    let out = resolver.resolve("98765", "555@s.whatsapp.net", 3).await;
    assert_eq!(out, "98765@s.whatsapp.net");

    // A linked id without a group context cannot be resolved; unchanged.
    let out = resolver.resolve("777001@lid", "555@s.whatsapp.net", 3).await;
    assert_eq!(out, "777001@lid");

    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn membership_scan_finds_the_owner_of_a_linked_id() {
    let client = client_with_member();
    let resolver = LidResolver::new(client.clone());

    let out = resolver.resolve("777002@lid", GROUP, 3).await;
    assert_eq!(out, "222@s.whatsapp.net");
}

#[tokio::test]
async fn fresh_positive_entry_short_circuits_resolution() {
    let client = client_with_member();
    let resolver = LidResolver::new(client.clone());

    let first = resolver.resolve("777001@lid", GROUP, 3).await;
    let second = resolver.resolve("777001@lid", GROUP, 3).await;
    assert_eq!(first, "111@s.whatsapp.net");
    assert_eq!(second, first);

    // Exactly one roster fetch across both calls.
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_retries_degrade_to_the_original_identifier() {
    let client = client_with_member();
    client.fail_metadata_forever();
    let resolver = LidResolver::new(client.clone());

    let out = resolver.resolve("777001@lid", GROUP, 2).await;
    assert_eq!(out, "777001@lid");
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 2);

    // The failure is remembered, as an error marker rather than a result.
    let entry = resolver.cached("777001").expect("marker cached");
    assert!(!entry.found);
    assert!(entry.error.is_some());
}

#[tokio::test]
async fn unknown_linked_id_caches_a_not_found_marker() {
    let client = client_with_member();
    let resolver = LidResolver::new(client.clone());

    let out = resolver.resolve("424242@lid", GROUP, 3).await;
    assert_eq!(out, "424242@lid");

    let entry = resolver.cached("424242").expect("marker cached");
    assert!(!entry.found);

    // A not-found marker does not short-circuit; the next call scans again.
    let _ = resolver.resolve("424242@lid", GROUP, 3).await;
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_positive_entry_triggers_a_new_scan() {
    let client = client_with_member();
    let resolver = LidResolver::new(client.clone());

    let _ = resolver.resolve("777001@lid", GROUP, 3).await;
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 1);

    // Six minutes is past the positive TTL.
    assert!(resolver.test_force_captured_at("777001", 6 * 60));
    let out = resolver.resolve("777001@lid", GROUP, 3).await;
    assert_eq!(out, "111@s.whatsapp.net");
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn clear_cache_forces_a_fresh_scan() {
    let client = client_with_member();
    let resolver = LidResolver::new(client.clone());

    let _ = resolver.resolve("777001@lid", GROUP, 3).await;
    resolver.clear_cache();
    let _ = resolver.resolve("777001@lid", GROUP, 3).await;
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 2);
}
