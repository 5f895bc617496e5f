// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Connection Integration Tests
//!
//! - `test_provision_*`: groups and items created by connect
//! - `test_health_*`: check_status supervision and recovery
//! - `test_io_*`: reads and writes through the registry
//! - `test_delivery_*`: subscription dispatch
//! - `test_registry_*`: handle mapping across reconnects

use std::sync::Arc;

use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use tagbridge_core::{BridgeError, TagId};
use tagbridge_da::{
    ChangeBatch, ChangeEntry, ConnectionState, DataSource, FileTime, ItemEntry, ItemHandle,
    ManagerOptions, NativeValue, Quality, ServerState, TagChange, TagRegistry, VarType,
};
use tagbridge_tests::common::fixtures::{parse_document, DocumentFixtures, TransportFixtures};
use tagbridge_tests::common::harness::ManagerHarness;
use tagbridge_tests::common::init_test_logging;

/// Collects changes handed to a callback.
#[derive(Default)]
struct Recorder(Mutex<Vec<TagChange>>);

impl Recorder {
    fn push(&self, change: TagChange) {
        self.0.lock().unwrap().push(change);
    }

    fn take(&self) -> Vec<TagChange> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

// =============================================================================
// Provisioning
// =============================================================================

#[tokio::test]
async fn test_provision_plant() {
    init_test_logging();
    let harness = ManagerHarness::connected().await;
    let manager = &harness.manager;

    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(harness.transport.session(), Some(("plc-host".into(), "Sim.Server.1".into())));
    assert_eq!(manager.registry().ids(), vec![TagId(1), TagId(2), TagId(3), TagId(10), TagId(11)]);

    let groups = manager.groups();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].name, "fast");
    assert_eq!(groups[0].revised_rate_ms, 500);
    assert_eq!(groups[0].tag_count, 3);
    assert!(groups[0].subscribe);
    assert_eq!(groups[1].requested_rate_ms, 1000);
    assert!(groups.iter().all(|g| g.failed_items == 0));

    let entry = manager.registry().lookup_handle(TagId(2)).unwrap();
    assert_eq!(entry.data_type, VarType::R8);
    assert_eq!(entry.name, "Line.Temperature");
}

#[tokio::test]
async fn test_provision_update_rate_end_to_end() {
    for (rate, expected) in [(None, 1000u32), (Some(50), 100)] {
        let harness = ManagerHarness::new(TransportFixtures::plant());
        let config = parse_document(&DocumentFixtures::single_group(rate));
        harness.manager.connect(config).await.unwrap();

        let requests = harness.transport.group_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].update_rate_ms, expected, "UpdateRate {rate:?}");
        assert!(requests[0].active);
    }
}

#[tokio::test]
async fn test_provision_skips_unknown_items() {
    let harness = ManagerHarness::new(TransportFixtures::plant());
    let config = parse_document(DocumentFixtures::with_unknown_item());
    harness.manager.connect(config).await.unwrap();

    let groups = harness.manager.groups();
    assert_eq!(groups[0].tag_count, 1);
    assert_eq!(groups[0].failed_items, 1);
    assert!(harness.manager.registry().lookup_handle(TagId(99)).is_none());

    let err = harness
        .manager
        .read(TagId(99), DataSource::Cache)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Operation(_)));
}

#[tokio::test]
async fn test_provision_open_failure() {
    let transport = TransportFixtures::plant();
    transport.fail_open(true);
    let harness = ManagerHarness::new(transport);

    let err = harness
        .manager
        .connect(ManagerHarness::plant_config())
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Session(_)));
    assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
    assert!(harness.manager.registry().is_empty());
}

// =============================================================================
// Health Supervision
// =============================================================================

#[tokio::test]
async fn test_health_recovers_on_third_attempt() {
    let harness = ManagerHarness::connected().await;
    let before = harness.transport.status_count();

    // check, reconnect settle poll, then attempts 1..=3 of the retry loop
    harness.transport.script_status([
        ServerState::Suspended,
        ServerState::Running,
        ServerState::Suspended,
        ServerState::Suspended,
        ServerState::Running,
    ]);

    assert!(harness.manager.check_status(true).await);
    assert_eq!(harness.manager.state(), ConnectionState::Connected);
    assert_eq!(harness.transport.status_count() - before, 5);
    assert_eq!(harness.transport.open_count(), 2);
    assert_eq!(harness.manager.stats().reconnects(), 1);
}

#[tokio::test]
async fn test_health_gives_up_after_five_attempts() {
    let harness = ManagerHarness::connected().await;
    harness.transport.set_default_status(ServerState::Suspended);
    let before = harness.transport.status_count();

    assert!(!harness.manager.check_status(true).await);
    assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
    // check + reconnect settle poll + five retry attempts
    assert_eq!(harness.transport.status_count() - before, 7);
}

#[tokio::test]
async fn test_health_custom_attempt_budget() {
    let harness = ManagerHarness::with_options(
        TransportFixtures::plant(),
        ManagerOptions::immediate().with_health_attempts(2),
    );
    harness
        .manager
        .connect(ManagerHarness::plant_config())
        .await
        .unwrap();
    harness.transport.set_default_status(ServerState::Test);
    let before = harness.transport.status_count();

    assert!(!harness.manager.check_status(true).await);
    assert_eq!(harness.transport.status_count() - before, 4);
}

#[tokio::test]
async fn test_health_fatal_server_during_reconnect() {
    let harness = ManagerHarness::connected().await;
    harness.transport.set_default_status(ServerState::CommFault);

    assert!(!harness.manager.check_status(true).await);
    assert_eq!(harness.manager.state(), ConnectionState::Disconnected);

    harness.transport.set_default_status(ServerState::Running);
    assert!(harness.manager.check_status(true).await);
    assert_eq!(harness.manager.state(), ConnectionState::Connected);
}

// =============================================================================
// Reads and Writes
// =============================================================================

#[tokio::test]
async fn test_io_read_values_and_timestamp() {
    let harness = ManagerHarness::connected().await;
    let instant = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    harness
        .transport
        .set_timestamp(FileTime::from_datetime(instant).unwrap());

    let speed = harness.manager.read(TagId(1), DataSource::Device).await.unwrap();
    assert!(speed.ok);
    assert_eq!(speed.bytes, TransportFixtures::SPEED.to_ne_bytes().to_vec());
    assert_eq!(speed.timestamp, instant.timestamp() as u64 * 10_000_000);
    assert_eq!(harness.transport.read_sources(), vec![DataSource::Device]);

    let name = harness.manager.read(TagId(10), DataSource::Cache).await.unwrap();
    assert_eq!(name.bytes, b"B-17".to_vec());
}

#[tokio::test]
async fn test_io_bad_item_is_a_value() {
    let harness = ManagerHarness::connected().await;
    harness
        .transport
        .set_item_status("Line.Running", Quality::BAD_DEVICE_FAILURE, -5);

    let value = harness.manager.read(TagId(3), DataSource::Cache).await.unwrap();
    assert!(!value.ok);
    assert!(value.is_empty());
    assert!(value.quality.is_bad());
}

#[tokio::test]
async fn test_io_read_while_disconnected_makes_no_call() {
    let harness = ManagerHarness::connected().await;
    harness.transport.script_status([ServerState::Suspended]);
    assert!(!harness.manager.check_status(false).await);
    assert_eq!(harness.manager.state(), ConnectionState::Disconnected);

    let err = harness
        .manager
        .read(TagId(1), DataSource::Cache)
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(harness.transport.read_count(), 0);
}

#[tokio::test]
async fn test_io_write_then_read_back() {
    let harness = ManagerHarness::connected().await;

    harness
        .manager
        .write(TagId(2), &99.5f64.to_ne_bytes())
        .await
        .unwrap();
    assert_eq!(
        harness.transport.value_of("Line.Temperature"),
        Some(NativeValue::R8(99.5))
    );

    let value = harness.manager.read(TagId(2), DataSource::Device).await.unwrap();
    assert_eq!(value.bytes, 99.5f64.to_ne_bytes().to_vec());
}

#[tokio::test]
async fn test_io_short_write_is_rejected_locally() {
    let harness = ManagerHarness::connected().await;

    let err = harness.manager.write(TagId(2), &[0u8; 4]).await.unwrap_err();
    assert!(matches!(err, BridgeError::Codec(_)));
    assert_eq!(harness.transport.write_count(), 0);
    assert_eq!(
        harness.transport.value_of("Line.Temperature"),
        Some(NativeValue::R8(TransportFixtures::TEMPERATURE))
    );
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_delivery_order_and_unknown_handles() {
    let harness = ManagerHarness::connected().await;
    let recorder = Arc::new(Recorder::default());
    let sink = recorder.clone();
    harness
        .manager
        .set_handler(Arc::new(move |change: TagChange| sink.push(change)));
    harness.manager.subscribe().await.unwrap();

    let first = harness.transport.change("Line.Speed", NativeValue::I4(1)).unwrap();
    let second = harness.transport.change("Line.Speed", NativeValue::I4(2)).unwrap();
    let stray = ChangeEntry {
        handle: ItemHandle(9_999),
        ..first.clone()
    };

    let group = harness.transport.active_groups()[0];
    assert!(harness
        .transport
        .push_batch(group, ChangeBatch::new(vec![first, second, stray])));

    let changes = recorder.take();
    assert_eq!(changes.len(), 2);
    assert!(changes.iter().all(|c| c.id == TagId(1)));
    assert_eq!(changes[0].value.bytes, 1i32.to_ne_bytes().to_vec());
    assert_eq!(changes[1].value.bytes, 2i32.to_ne_bytes().to_vec());

    let stats = harness.manager.dispatcher().stats().snapshot();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.skipped, 1);
}

#[tokio::test]
async fn test_delivery_only_for_subscribed_groups() {
    let harness = ManagerHarness::connected().await;
    assert_eq!(harness.manager.subscribe().await.unwrap(), 1);
    assert_eq!(harness.transport.active_groups().len(), 1);

    harness.manager.unsubscribe().await.unwrap();
    assert!(harness.transport.active_groups().is_empty());
}

#[tokio::test]
async fn test_delivery_handler_released_on_close() {
    let harness = ManagerHarness::connected().await;
    harness.manager.set_handler(Arc::new(|_: TagChange| {}));
    assert!(harness.manager.dispatcher().has_handler());

    harness.manager.close().await.unwrap();
    assert!(!harness.manager.dispatcher().has_handler());
    assert_eq!(harness.manager.state(), ConnectionState::Stopped);
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_registry_clear_then_reuse_has_no_stale_alias() {
    let registry = TagRegistry::new();
    registry.register(TagId(1), ItemEntry::new(ItemHandle(1), VarType::I4, "a"));
    registry.clear();
    registry.register(TagId(2), ItemEntry::new(ItemHandle(1), VarType::R8, "b"));

    assert!(registry.lookup_handle(TagId(1)).is_none());
    assert_eq!(registry.lookup_id(ItemHandle(1)), Some(TagId(2)));
}

#[tokio::test]
async fn test_registry_rebuilt_on_reconnect_with_new_document() {
    let harness = ManagerHarness::connected().await;
    let old = harness.manager.registry().lookup_handle(TagId(1)).unwrap().handle;

    let config = parse_document(
        r#"{"Server": "Sim.Server.1", "Groups": [
            {"Group": "g", "Variables": [{"Id": 50, "Name": "Batch.Name"}]}
        ]}"#,
    );
    harness.manager.connect(config).await.unwrap();

    assert!(harness.manager.registry().lookup_handle(TagId(1)).is_none());
    assert_eq!(harness.manager.registry().lookup_id(old), Some(TagId(50)));
    assert_eq!(harness.manager.registry().len(), 1);
}
