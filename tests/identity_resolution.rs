mod common;

use common::{candidate, serve, TestLookup, TestRegistry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use vessel_registry::config::{LookupConfig, ResolverOptions};
use vessel_registry::lookup::{RapidApiLookup, VesselLookup};
use vessel_registry::registry::VesselRegistry;
use vessel_registry::resolver::IdentityResolver;
use vessel_registry::vessel::{ResolutionSource, VesselRecord};

#[tokio::test]
async fn test_static_table_wins_over_registry_and_network() {
    let registry = Arc::new(TestRegistry::new());
    registry
        .upsert_batch(&[VesselRecord::new("HMM HOPE", Some("1".to_string()), None, "70")])
        .await
        .unwrap();
    let lookup = Arc::new(TestLookup::new().answer("hmm hope", vec![candidate(Some("2"), None, "Cargo")]));

    let resolver = IdentityResolver::new(registry.clone(), lookup.clone());
    let result = resolver.resolve("  hmm hope ").await;

    assert_eq!(result.source, ResolutionSource::StaticHit);
    assert_eq!(result.mmsi.as_deref(), Some("440176000"));
    assert!(result.from_cache);
    assert_eq!(lookup.calls(), 0);
    assert_eq!(registry.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_network_result_becomes_cache_hit() {
    let registry = Arc::new(TestRegistry::new());
    let lookup = Arc::new(TestLookup::new().answer(
        "Ever Given",
        vec![candidate(Some("353136000"), Some("9811000"), "Container Ship")],
    ));
    let resolver = IdentityResolver::new(registry.clone(), lookup.clone());

    let first = resolver.resolve("Ever Given").await;
    assert_eq!(first.source, ResolutionSource::NetworkLookup);
    assert!(!first.from_cache);
    assert_eq!(first.mmsi.as_deref(), Some("353136000"));

    let second = resolver.resolve("EVER GIVEN").await;
    assert_eq!(second.source, ResolutionSource::CacheHit);
    assert!(second.from_cache);
    assert_eq!(second.mmsi, first.mmsi);
    assert_eq!(second.imo.as_deref(), Some("9811000"));
    assert_eq!(second.ship_type.as_deref(), Some("Container Ship"));

    assert_eq!(lookup.calls(), 1);
    assert_eq!(*lookup.terms.lock().unwrap(), vec!["Ever Given".to_string()]);
}

#[tokio::test]
async fn test_cargo_candidate_preferred_over_first() {
    let registry = Arc::new(TestRegistry::new());
    let lookup = Arc::new(TestLookup::new().answer(
        "MAERSK",
        vec![
            candidate(Some("111"), None, "Tug"),
            candidate(Some("222"), None, "General Cargo Ship"),
        ],
    ));
    let resolver = IdentityResolver::new(registry.clone(), lookup);

    let result = resolver.resolve("MAERSK").await;
    assert_eq!(result.mmsi.as_deref(), Some("222"));

    let stored = registry.inner.get("MAERSK").await.unwrap().unwrap();
    assert_eq!(stored.mmsi.as_deref(), Some("222"));
}

#[tokio::test]
async fn test_unknown_name_leaves_registry_unchanged() {
    let registry = Arc::new(TestRegistry::new());
    let lookup = Arc::new(TestLookup::new());
    let resolver = IdentityResolver::new(registry.clone(), lookup.clone());

    let result = resolver.resolve("GHOST SHIP").await;

    assert_eq!(result.source, ResolutionSource::Unresolved);
    assert!(result.mmsi.is_none());
    assert!(!result.from_cache);
    assert_eq!(lookup.calls(), 1);
    assert_eq!(registry.count(), 0);
    assert_eq!(registry.upserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_candidate_without_mmsi_is_unresolved() {
    let registry = Arc::new(TestRegistry::new());
    let lookup = Arc::new(TestLookup::new().answer(
        "NAMELESS",
        vec![candidate(None, Some("9000001"), "Container Ship")],
    ));
    let resolver = IdentityResolver::new(registry.clone(), lookup);

    let result = resolver.resolve("NAMELESS").await;

    assert_eq!(result.source, ResolutionSource::Unresolved);
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_empty_name_touches_nothing() {
    let registry = Arc::new(TestRegistry::new());
    let lookup = Arc::new(TestLookup::new());
    let resolver = IdentityResolver::new(registry.clone(), lookup.clone());

    let result = resolver.resolve("   ").await;

    assert_eq!(result.source, ResolutionSource::Unresolved);
    assert!(result.from_cache);
    assert_eq!(lookup.calls(), 0);
    assert_eq!(registry.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_lookup_failure_resolves_to_unresolved() {
    let registry = Arc::new(TestRegistry::new());
    let mut lookup = TestLookup::new();
    lookup.fail = true;
    let resolver = IdentityResolver::new(registry.clone(), Arc::new(lookup));

    let result = resolver.resolve("EVER ACE").await;

    assert_eq!(result.source, ResolutionSource::Unresolved);
    assert!(!result.from_cache);
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_write_back_failure_keeps_result() {
    let mut registry = TestRegistry::new();
    registry.fail_writes = true;
    let registry = Arc::new(registry);
    let lookup = Arc::new(
        TestLookup::new().answer("ONE STORK", vec![candidate(Some("373000000"), None, "Container Ship")]),
    );
    let resolver = IdentityResolver::new(registry.clone(), lookup.clone());

    let first = resolver.resolve("ONE STORK").await;
    let second = resolver.resolve("ONE STORK").await;

    assert_eq!(first.mmsi.as_deref(), Some("373000000"));
    assert_eq!(first.source, ResolutionSource::NetworkLookup);
    assert_eq!(second.source, ResolutionSource::NetworkLookup);
    assert_eq!(lookup.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coalesced_lookups_share_one_network_call() {
    let registry = Arc::new(TestRegistry::new());
    let mut lookup = TestLookup::new().answer(
        "YM WISDOM",
        vec![candidate(Some("416000000"), None, "Container Ship")],
    );
    lookup.delay = Some(Duration::from_millis(200));
    let lookup = Arc::new(lookup);

    let resolver = Arc::new(IdentityResolver::with_options(
        registry.clone(),
        lookup.clone(),
        &ResolverOptions {
            coalesce_inflight: true,
        },
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve("YM WISDOM").await })
        })
        .collect();

    let mut network_results = 0;
    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.mmsi.as_deref(), Some("416000000"));
        if !result.from_cache {
            network_results += 1;
        }
    }
    assert_eq!(lookup.calls(), 1);
    assert_eq!(network_results, 1);
}

#[tokio::test]
async fn test_rapidapi_client_against_local_service() {
    let (base_url, seen) = serve(|target| {
        if target.starts_with("/search?name=") {
            let body = r#"[
                {"MMSI": 477000000, "IMO": "IMO 9000002", "NAME": "SEASPAN X", "TYPE": "Tanker"},
                {"MMSI": "477000001", "IMO": "9000003", "NAME": "SEASPAN Y", "TYPE": "Container Ship"}
            ]"#;
            (200, body.as_bytes().to_vec())
        } else {
            (404, Vec::new())
        }
    })
    .await;

    let lookup = RapidApiLookup::new(LookupConfig {
        base_url,
        api_key: Some("test-key".to_string()),
        api_host: "vessels.test".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap();

    let candidates = lookup.search("Seaspan").await.unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].mmsi.as_deref(), Some("477000000"));
    assert_eq!(candidates[0].imo.as_deref(), Some("9000002"));

    let registry = Arc::new(TestRegistry::new());
    let resolver = IdentityResolver::new(registry.clone(), Arc::new(lookup));
    let result = resolver.resolve("Seaspan").await;
    assert_eq!(result.mmsi.as_deref(), Some("477000001"));
    assert!(registry.inner.get("SEASPAN").await.unwrap().is_some());

    let requests = seen.lock().unwrap();
    assert_eq!(requests[0].target, "/search?name=Seaspan");
    let head = requests[0].head.to_lowercase();
    assert!(head.contains("x-rapidapi-key: test-key"));
    assert!(head.contains("x-rapidapi-host: vessels.test"));
}

#[tokio::test]
async fn test_rapidapi_error_status_is_unresolved() {
    let (base_url, _seen) = serve(|_| (429, b"rate limited".to_vec())).await;
    let lookup = RapidApiLookup::new(LookupConfig {
        base_url,
        api_key: Some("test-key".to_string()),
        ..LookupConfig::default()
    })
    .unwrap();

    let registry = Arc::new(TestRegistry::new());
    let resolver = IdentityResolver::new(registry.clone(), Arc::new(lookup));
    let result = resolver.resolve("KOTA PUSAKA").await;

    assert_eq!(result.source, ResolutionSource::Unresolved);
    assert_eq!(registry.count(), 0);
}
