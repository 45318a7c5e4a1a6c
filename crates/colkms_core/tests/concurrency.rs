//! Cache behaviour under concurrent contexts.

use colkms_core::{CryptoFactory, KmsConfig, KmsError, MasterKeyLookup};
use colkms_testkit::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_writers_resolve_each_master_key_once() {
    let fixture = Arc::new(DemoFixture::new());
    fixture.store.set_latency(Duration::from_millis(5));

    let config = StressConfig {
        threads: 8,
        contexts_per_thread: 20,
    };
    let (result, footer_tokens) = stress_encryption_contexts(&fixture, &config);

    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.successful_ops, 160);
    assert_eq!(footer_tokens.len(), 1);
    assert_eq!(result.store_calls, 3);
    for id in [FOOTER_KEY_ID, ORDER_ID_KEY_ID, PRODUCT_ID_KEY_ID] {
        assert_eq!(fixture.store.resolve_count_for(id), 1, "{id}");
    }
}

#[test]
fn concurrent_readers_unwrap_each_token_once() {
    let fixture = Arc::new(DemoFixture::new());
    fixture.store.set_latency(Duration::from_millis(5));

    let result = stress_decryption_contexts(&fixture, &StressConfig::default());
    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.store_calls, 3);
}

#[test]
fn expired_entries_generate_fresh_keys() {
    let fixture = DemoFixture::with_config(
        KmsConfig::new().cache_lifetime(Duration::from_millis(30)),
    );

    let first = fixture
        .factory
        .file_encryption_context(fixture.demo_plan())
        .unwrap();
    let first_dek = first.footer_key().unwrap().dek().clone();
    drop(first);

    thread::sleep(Duration::from_millis(60));
    let second = fixture
        .factory
        .file_encryption_context(fixture.demo_plan())
        .unwrap();

    assert_ne!(second.footer_key().unwrap().dek(), &first_dek);
    assert_eq!(fixture.store.resolve_count_for(FOOTER_KEY_ID), 2);
    assert!(fixture.factory.cache_stats().expirations >= 1);
}

#[test]
fn offline_store_commits_nothing_to_cache() {
    let fixture = DemoFixture::new();
    fixture.store.set_offline(true);

    let err = fixture
        .factory
        .file_encryption_context(fixture.demo_plan())
        .unwrap_err();
    assert!(matches!(err, KmsError::WrapFailure { .. }));

    fixture.store.set_offline(false);
    fixture.store.reset_counts();
    let context = fixture
        .factory
        .file_encryption_context(fixture.demo_plan())
        .unwrap();
    assert_eq!(context.key_count(), 3);
    assert_eq!(fixture.store.resolve_count(), 3);
}

#[test]
fn cloned_factories_share_one_cache() {
    let fixture = Arc::new(DemoFixture::new());
    fixture.store.set_latency(Duration::from_millis(20));

    let factory: CryptoFactory = fixture.factory.clone();
    let handles: Vec<_> = [FOOTER_KEY_ID, ORDER_ID_KEY_ID, PRODUCT_ID_KEY_ID]
        .into_iter()
        .map(|id| {
            let factory = factory.clone();
            thread::spawn(move || {
                let plan = factory
                    .plan_builder(demo_schema())
                    .footer_key(id)
                    .column_key(ORDER_ID_KEY_ID, ["orderId"])
                    .column_key(PRODUCT_ID_KEY_ID, ["productId"])
                    .build()
                    .unwrap();
                factory.file_encryption_context(plan).map(|c| c.key_count())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 3);
    }
    // Footer under each of the three keys plus the two shared column entries.
    assert_eq!(fixture.factory.cache().len(), 5);
    assert_eq!(fixture.store.resolve_count(), 5);

    let metadata = fixture
        .factory
        .file_encryption_context(fixture.demo_plan())
        .unwrap()
        .finish()
        .unwrap();
    assert!(fixture
        .factory
        .file_decryption_context(&metadata, &MasterKeyLookup::FromMetadata)
        .is_ok());
}
