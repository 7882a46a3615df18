// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Session Integration Tests
//!
//! Drives [`Session`] end-to-end against the in-memory provider.
//!
//! ## Test Categories
//!
//! - `test_connect_*`: provider class and server fallback
//! - `test_read_*`: result order, shapes, per-tag failures, async waiting
//! - `test_group_*`: named group caching, rebuild and partitioning
//! - `test_write_*`: batched writes and per-tag status
//! - `test_close_*`: group removal and disconnect
//! - `test_ping_*`: server liveness

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use opcgate_core::{
    error::{GatewayError, Operation, ProviderFault},
    provider::{
        memory::SIMULATION_SERVER, Delivery, MemoryProvider, MemoryProviderFactory, E_FAIL,
    },
    read::ReadOptions,
    session::HEALTH_TAGS_UNSUPPORTED,
    types::{DataSource, Quality, ReadOutput, ReadSource, Value, WriteOutput, WriteStatus},
    write::WriteOptions,
    Session, SessionSettings,
};

// =============================================================================
// Fixtures
// =============================================================================

fn open(provider: &MemoryProvider) -> Session {
    let factory = MemoryProviderFactory::shared(provider.clone());
    Session::open(&factory, SessionSettings::default()).unwrap()
}

async fn connected() -> (Session, MemoryProvider) {
    let provider = MemoryProvider::simulation();
    let mut session = open(&provider);
    assert!(session.connect(Some(SIMULATION_SERVER), None).await.unwrap());
    (session, provider)
}

fn many(output: ReadOutput) -> Vec<opcgate_core::TagResult> {
    match output {
        ReadOutput::Many(results) => results,
        ReadOutput::Single(reading) => panic!("expected a list, got {reading:?}"),
    }
}

fn tags_of(results: &[opcgate_core::TagResult]) -> Vec<&str> {
    results.iter().map(|r| r.tag.as_str()).collect()
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_connect_falls_back_through_server_list() {
    let provider = MemoryProvider::simulation();
    let mut session = open(&provider);

    let servers = format!("Bogus.Server;;{SIMULATION_SERVER}");
    assert!(session.connect(Some(&servers), None).await.unwrap());
    assert!(session.is_connected());
    assert_eq!(provider.connected_server().as_deref(), Some(SIMULATION_SERVER));
    assert_eq!(provider.client_name().as_deref(), Some("OpenOPC"));
    assert_eq!(session.host(), Some("localhost"));
}

#[tokio::test]
async fn test_connect_single_server_reports_fault() {
    let provider = MemoryProvider::simulation();
    let mut session = open(&provider);

    let err = session.connect(Some("Bogus.Server"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Connect: -2147467259");
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_connect_exhausted_server_list() {
    let provider = MemoryProvider::simulation();
    let mut session = open(&provider);

    let err = session
        .connect(Some("Bogus.One;Bogus.Two"), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Connect: Cannot connect to any of the servers in the OPC_SERVER list"
    );
}

#[tokio::test]
async fn test_connect_default_server_list() {
    let provider = MemoryProvider::simulation();
    let mut session = open(&provider);

    // The simulation server is part of the built-in list.
    assert!(session.connect(None, None).await.unwrap());
    assert_eq!(provider.connected_server().as_deref(), Some(SIMULATION_SERVER));
}

#[test]
fn test_connect_bad_provider_class() {
    let factory = MemoryProviderFactory::new(MemoryProvider::simulation());
    let err = Session::open(&factory, SessionSettings::default().with_class("Bogus.Class"))
        .unwrap_err();
    assert_eq!(err.to_string(), "Dispatch: Invalid class string");

    let session = Session::open(
        &factory,
        SessionSettings::default().with_class("Bogus.Class;Matrikon.OPC.Automation"),
    )
    .unwrap();
    assert_eq!(session.class(), "Matrikon.OPC.Automation");
}

#[tokio::test]
async fn test_reconnect_drops_groups() {
    let (mut session, provider) = connected().await;
    session
        .read(vec!["Random.Int4"], ReadOptions::new().group("G"))
        .await
        .unwrap();
    assert_eq!(session.groups(), vec!["G".to_string()]);
    assert!(provider.is_advised("G.0"));

    assert!(session.connect(None, None).await.unwrap());
    assert!(session.groups().is_empty());
    assert_eq!(session.server(), Some(SIMULATION_SERVER));
    assert_eq!(provider.group_count(), 0);
    assert_eq!(provider.calls(Operation::CloseEvents), 1);

    // Reading the group again creates exactly one subscription.
    session
        .read(vec!["Random.Int4"], ReadOptions::new().group("G"))
        .await
        .unwrap();
    assert_eq!(provider.group_names(), vec![Some("G.0".to_string())]);
}

#[tokio::test]
async fn test_reconnect_survives_teardown_failure() {
    let (mut session, provider) = connected().await;
    session
        .read(vec!["Random.Int4"], ReadOptions::new().group("G").sync(true))
        .await
        .unwrap();
    provider.fail(Operation::RemoveGroup, ProviderFault::new(E_FAIL));

    assert!(session.connect(None, None).await.unwrap());
    assert!(session.groups().is_empty());
}

#[tokio::test]
async fn test_ping_tracks_server_clock() {
    let provider = MemoryProvider::simulation();
    let mut session = open(&provider);
    assert!(!session.ping().await);

    session.connect(Some(SIMULATION_SERVER), None).await.unwrap();
    assert!(session.ping().await);
    assert!(session.ping().await);

    provider.freeze_clock(chrono::DateTime::<chrono::Utc>::MIN_UTC);
    assert!(session.ping().await);
    assert!(!session.ping().await);

    provider.fail(Operation::Ping, ProviderFault::new(E_FAIL));
    assert!(!session.ping().await);
}

#[tokio::test]
async fn test_calls_require_connection() {
    let provider = MemoryProvider::simulation();
    let mut session = open(&provider);

    let err = session.read("Random.Int4", ReadOptions::new()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotConnected));

    let err = session
        .write(("Bucket Brigade.Int4", 1), WriteOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotConnected));
    assert_eq!(provider.calls(Operation::AddGroup), 0);
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_read_preserves_order_async() {
    let (mut session, provider) = connected().await;
    let requested = ["Random.Real8", "Bogus.Tag", "Random.Int4", "Random.String"];

    let results = many(session.read(requested, ReadOptions::new()).await.unwrap());
    assert_eq!(tags_of(&results), requested);

    assert_eq!(results[0].value, Some(Value::Float64(1_054.375)));
    assert_eq!(results[0].quality, Quality::Good);
    assert!(results[0].timestamp.is_some());
    assert_eq!(results[1].value, None);
    assert_eq!(results[1].quality, Quality::Error);
    assert_eq!(results[2].value, Some(Value::Int32(1_893_402)));
    assert_eq!(results[3].value, Some(Value::from("Hello")));

    assert_eq!(provider.calls(Operation::AsyncRefresh), 1);
    assert_eq!(provider.calls(Operation::SyncRead), 0);
    // Anonymous sub-groups do not outlive the call.
    assert_eq!(provider.group_count(), 0);
}

#[tokio::test]
async fn test_read_preserves_order_sync() {
    let (mut session, provider) = connected().await;
    let requested = ["Bogus.Tag", "Random.Boolean", "Triangle Waves.UInt2"];

    let results = many(
        session
            .read(requested, ReadOptions::new().sync(true))
            .await
            .unwrap(),
    );
    assert_eq!(tags_of(&results), requested);
    assert!(results[0].is_error());
    assert_eq!(results[1].value, Some(Value::Bool(true)));
    assert_eq!(results[2].value, Some(Value::UInt16(40)));
    assert_eq!(provider.calls(Operation::SyncRead), 1);
    assert_eq!(provider.sources(), vec![DataSource::Device]);
}

#[tokio::test]
async fn test_read_output_shapes() {
    let (mut session, _provider) = connected().await;

    let single = session.read("Random.Int4", ReadOptions::new()).await.unwrap();
    let reading = single.as_single().unwrap();
    assert_eq!(reading.value, Some(Value::Int32(1_893_402)));

    let list = session.read(vec!["Random.Int4"], ReadOptions::new()).await.unwrap();
    assert_eq!(list.as_many().map(<[_]>::len), Some(1));
}

#[tokio::test]
async fn test_read_include_error_messages() {
    let (mut session, provider) = connected().await;

    let results = many(
        session
            .read(
                vec!["Random.Int4", "Bogus.Tag", ""],
                ReadOptions::new().include_error(true),
            )
            .await
            .unwrap(),
    );

    assert_eq!(
        results[0].error.as_deref(),
        Some("The operation completed successfully.")
    );
    assert_eq!(
        results[1].error.as_deref(),
        Some("The item ID is not defined in the server address space or no longer exists.")
    );
    assert_eq!(
        results[2].error.as_deref(),
        Some("The item ID doesn't conform to the server's syntax.")
    );
    // Error text forces a synchronous read.
    assert_eq!(provider.calls(Operation::AsyncRefresh), 0);
    assert_eq!(provider.calls(Operation::SyncRead), 1);
}

#[tokio::test]
async fn test_read_errors_without_include_error_have_no_text() {
    let (mut session, _provider) = connected().await;

    let results = many(
        session
            .read(vec!["Bogus.Tag"], ReadOptions::new().sync(true))
            .await
            .unwrap(),
    );
    assert!(results[0].is_error());
    assert_eq!(results[0].error, None);
}

#[tokio::test]
async fn test_read_item_failures_do_not_abort_batch() {
    let (mut session, provider) = connected().await;
    provider.fail_item(Operation::AddItems, "Random.Int2", E_FAIL);
    provider.fail_item(Operation::SyncRead, "Random.Int1", E_FAIL);

    let results = many(
        session
            .read(
                vec!["Random.Int1", "Random.Int2", "Random.Int4"],
                ReadOptions::new().include_error(true),
            )
            .await
            .unwrap(),
    );

    assert!(results[0].is_error());
    assert_eq!(results[0].error.as_deref(), Some("Unspecified error"));
    assert!(results[1].is_error());
    assert_eq!(results[1].error.as_deref(), Some("Unspecified error"));
    assert_eq!(results[2].quality, Quality::Good);
}

#[tokio::test]
async fn test_read_validate_fault_marks_every_tag() {
    let (mut session, provider) = connected().await;
    provider.fail(Operation::Validate, ProviderFault::new(E_FAIL));

    let results = many(
        session
            .read(vec!["Random.Int4", "Random.Real8"], ReadOptions::new().sync(true))
            .await
            .unwrap(),
    );
    assert!(results.iter().all(|r| r.is_error()));
    assert_eq!(provider.calls(Operation::SyncRead), 0);
}

#[tokio::test]
async fn test_read_sync_fault_is_provider_error() {
    let (mut session, provider) = connected().await;
    provider.fail(
        Operation::SyncRead,
        ProviderFault::new(E_FAIL).with_provider_message("Device offline"),
    );

    let err = session
        .read(vec!["Random.Int4"], ReadOptions::new().sync(true))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "SyncRead: Device offline");
    assert_eq!(provider.group_count(), 0);
}

#[tokio::test]
async fn test_read_quality_from_provider_bits() {
    let provider = MemoryProvider::new()
        .with_server("Demo.Server")
        .with_point_quality("Plant.Flow", 12.5, 0x40)
        .with_point_quality("Plant.Level", 3.0, 0x00);
    let mut session = open(&provider);
    session.connect(Some("Demo.Server"), None).await.unwrap();

    let results = many(
        session
            .read(vec!["Plant.Flow", "Plant.Level"], ReadOptions::new())
            .await
            .unwrap(),
    );
    assert_eq!(results[0].quality, Quality::Uncertain);
    assert_eq!(results[1].quality, Quality::Bad);
    assert_eq!(results[1].value, Some(Value::Float64(3.0)));
}

#[tokio::test(start_paused = true)]
async fn test_read_async_timeout() {
    let (mut session, provider) = connected().await;
    provider.set_delivery(Delivery::Suppressed);

    let err = session
        .read(
            vec!["Random.Int4", "Random.Real8"],
            ReadOptions::new().timeout(Duration::from_millis(250)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Timeout { .. }));
    assert_eq!(err.to_string(), "Callback: Timeout waiting for data");
    assert!(err.is_retryable());
    // The throw-away sub-group is still torn down.
    assert_eq!(provider.group_count(), 0);
}

#[tokio::test]
async fn test_read_async_delayed_delivery() {
    let (mut session, provider) = connected().await;
    provider.set_delivery(Delivery::Delayed(Duration::from_millis(20)));

    let results = many(
        session
            .read(
                vec!["Random.Int4"],
                ReadOptions::new().timeout(Duration::from_secs(2)),
            )
            .await
            .unwrap(),
    );
    assert_eq!(results[0].value, Some(Value::Int32(1_893_402)));
}

#[tokio::test]
async fn test_read_async_discards_other_transactions() {
    let (mut session, provider) = connected().await;
    provider.set_delivery(Delivery::StaleFirst);

    for _ in 0..3 {
        let results = many(
            session
                .read(vec!["Random.Int4", "Random.Real4"], ReadOptions::new().group("G"))
                .await
                .unwrap(),
        );
        assert!(results.iter().all(|r| r.quality == Quality::Good));
    }
    assert_eq!(provider.calls(Operation::AsyncRefresh), 3);
}

#[tokio::test]
async fn test_read_health_tags() {
    let provider = MemoryProvider::simulation();
    let mut session = open(&provider);

    // Served without a provider round-trip, even before connecting.
    let results = many(
        session
            .read(vec!["@MemFree", "@CpuUsage"], ReadOptions::new())
            .await
            .unwrap(),
    );
    assert_eq!(tags_of(&results), ["@MemFree", "@CpuUsage"]);
    assert!(results.iter().all(|r| r.is_error()));
    assert_eq!(results[0].error.as_deref(), Some(HEALTH_TAGS_UNSUPPORTED));
    assert_eq!(provider.calls(Operation::Validate), 0);
}

#[tokio::test]
async fn test_read_rejects_mixed_health_tags() {
    let (mut session, provider) = connected().await;

    let err = session
        .read(vec!["@MemFree", "Random.Int4"], ReadOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidArgument { .. }));
    assert_eq!(provider.calls(Operation::AddGroup), 0);
}

#[tokio::test]
async fn test_read_empty_anonymous() {
    let (mut session, provider) = connected().await;

    let results = many(
        session
            .read(Vec::<String>::new(), ReadOptions::new())
            .await
            .unwrap(),
    );
    assert!(results.is_empty());
    assert_eq!(provider.calls(Operation::AddGroup), 0);
}

#[tokio::test]
async fn test_iread_reads_one_sub_group_at_a_time() {
    let (mut session, provider) = connected().await;

    let mut cursor = session
        .iread(
            vec!["Random.Int1", "Random.Int2", "Random.Int4"],
            ReadOptions::new().size(1).sync(true),
        )
        .unwrap();

    let first = cursor.next().await.unwrap().unwrap();
    assert_eq!(first.tag, "Random.Int1");
    assert_eq!(provider.calls(Operation::AddGroup), 1);

    let second = cursor.next().await.unwrap().unwrap();
    assert_eq!(second.tag, "Random.Int2");
    assert_eq!(provider.calls(Operation::AddGroup), 2);

    let rest = cursor.collect().await.unwrap();
    assert_eq!(tags_of(&rest), ["Random.Int4"]);
    assert_eq!(provider.calls(Operation::AddGroup), 3);
}

#[tokio::test]
async fn test_get_returns_value_only() {
    let (mut session, _provider) = connected().await;

    assert_eq!(
        session.get("Random.Real4").await.unwrap(),
        Some(Value::Float32(7.25))
    );
    assert_eq!(session.get("Bogus.Tag").await.unwrap(), None);
}

#[tokio::test]
async fn test_read_trace_labels() {
    let (mut session, _provider) = connected().await;
    let labels = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&labels);
    session.set_trace(move |label| sink.lock().push(label.to_string()));

    session
        .read(vec!["Random.Int4"], ReadOptions::new().sync(true))
        .await
        .unwrap();

    let seen = labels.lock().clone();
    assert!(seen[0].starts_with("AddGroup("));
    assert!(seen.contains(&"Validate(Random.Int4)".to_string()));
    assert!(seen.contains(&"AddItems(Random.Int4)".to_string()));
    assert!(seen.contains(&"SyncRead(device)".to_string()));
    assert!(seen.last().unwrap().starts_with("RemoveGroup("));

    session.clear_trace();
    session.read("Random.Int4", ReadOptions::new()).await.unwrap();
    assert_eq!(labels.lock().len(), seen.len());
}

// =============================================================================
// Named groups
// =============================================================================

#[tokio::test]
async fn test_group_cache_hit_skips_subscription() {
    let (mut session, provider) = connected().await;
    let tags = vec!["Random.Int4", "Random.Real8"];

    session
        .read(tags.clone(), ReadOptions::new().group("G"))
        .await
        .unwrap();
    assert_eq!(provider.calls(Operation::AddGroup), 1);
    assert_eq!(provider.calls(Operation::AddItems), 1);

    let results = many(
        session
            .read(tags.clone(), ReadOptions::new().group("G"))
            .await
            .unwrap(),
    );
    assert_eq!(tags_of(&results), tags);
    assert_eq!(provider.calls(Operation::AddGroup), 1);
    assert_eq!(provider.calls(Operation::AddItems), 1);
    assert_eq!(provider.calls(Operation::Validate), 1);

    // Hybrid reads hit the device only when the group is built.
    assert_eq!(provider.sources(), vec![DataSource::Device, DataSource::Cache]);
    assert_eq!(session.groups(), vec!["G".to_string()]);
    assert_eq!(provider.group_names(), vec![Some("G.0".to_string())]);
    assert!(provider.is_advised("G.0"));
}

#[tokio::test]
async fn test_group_explicit_source_wins() {
    let (mut session, provider) = connected().await;
    let tags = vec!["Random.Int4"];

    session
        .read(tags.clone(), ReadOptions::new().group("G").source(ReadSource::Cache))
        .await
        .unwrap();
    session
        .read(tags.clone(), ReadOptions::new().group("G").source(ReadSource::Device))
        .await
        .unwrap();
    assert_eq!(provider.sources(), vec![DataSource::Cache, DataSource::Device]);
}

#[tokio::test]
async fn test_group_sync_then_async_attaches_hook() {
    let (mut session, provider) = connected().await;

    session
        .read(vec!["Random.Int4"], ReadOptions::new().group("G").sync(true))
        .await
        .unwrap();
    assert!(!provider.is_advised("G.0"));

    session
        .read(vec!["Random.Int4"], ReadOptions::new().group("G"))
        .await
        .unwrap();
    assert!(provider.is_advised("G.0"));
    assert_eq!(provider.calls(Operation::WithEvents), 1);
}

#[tokio::test]
async fn test_group_rebuild_reconciles_items() {
    let (mut session, provider) = connected().await;

    session
        .read(
            vec!["Random.Int4", "Random.Real8", "Random.Int2"],
            ReadOptions::new().group("G").sync(true),
        )
        .await
        .unwrap();
    let kept_handle = session.registry().get("G").unwrap().sub_groups()[0]
        .server_handle("Random.Int4")
        .unwrap();

    let results = many(
        session
            .read(
                vec!["Random.Int4", "Random.Real8", "Random.String"],
                ReadOptions::new().group("G").sync(true).rebuild(true),
            )
            .await
            .unwrap(),
    );
    assert_eq!(
        tags_of(&results),
        ["Random.Int4", "Random.Real8", "Random.String"]
    );
    assert!(results.iter().all(|r| r.quality == Quality::Good));

    let entry = session.registry().get("G").unwrap();
    let sub = &entry.sub_groups()[0];
    assert!(sub.valid().contains(&"Random.String".to_string()));
    assert!(!sub.valid().contains(&"Random.Int2".to_string()));
    assert_eq!(sub.server_handle("Random.Int4"), Some(kept_handle));
    assert!(sub.is_consistent());

    let items = provider.group_items("G.0");
    assert!(items.contains(&"Random.String".to_string()));
    assert!(!items.contains(&"Random.Int2".to_string()));
    assert_eq!(provider.calls(Operation::AddGroup), 1);
    assert_eq!(provider.calls(Operation::RemoveItems), 1);
}

#[tokio::test]
async fn test_group_failed_first_build_is_not_cached() {
    let (mut session, provider) = connected().await;
    let tags = vec!["Random.Int4", "Random.Real8"];
    provider.fail(Operation::WithEvents, ProviderFault::new(E_FAIL));

    let err = session
        .read(tags.clone(), ReadOptions::new().group("G"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "WithEvents: -2147467259");
    assert!(session.groups().is_empty());
    assert_eq!(provider.group_count(), 0);

    provider.clear_fault(Operation::WithEvents);
    let results = many(
        session
            .read(tags.clone(), ReadOptions::new().group("G"))
            .await
            .unwrap(),
    );
    assert_eq!(tags_of(&results), tags);
    assert!(results.iter().all(|r| r.quality == Quality::Good));
}

#[tokio::test]
async fn test_group_failed_later_chunk_discards_earlier_ones() {
    let (mut session, provider) = connected().await;
    let tags = vec!["Random.Int1", "Random.Int2", "Random.Int4"];
    let options = ReadOptions::new().group("P").size(2).sync(true);

    let mut cursor = session.iread(tags.clone(), options.clone()).unwrap();
    assert!(cursor.next().await.unwrap().is_ok());
    assert!(cursor.next().await.unwrap().is_ok());
    provider.fail(
        Operation::AddGroup,
        ProviderFault::new(E_FAIL).with_provider_message("no more groups"),
    );
    let err = cursor.next().await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "AddGroup: no more groups");
    assert!(cursor.next().await.is_none());
    drop(cursor);

    assert!(session.groups().is_empty());
    assert_eq!(provider.group_count(), 0);

    provider.clear_fault(Operation::AddGroup);
    let results = many(session.read(tags.clone(), options).await.unwrap());
    assert_eq!(tags_of(&results), tags);
    assert_eq!(session.registry().get("P").unwrap().len(), 2);
}

#[tokio::test]
async fn test_group_failed_rebuild_keeps_bookkeeping_consistent() {
    let (mut session, provider) = connected().await;
    session
        .read(
            vec!["Random.Int4", "Random.Real8"],
            ReadOptions::new().group("G").sync(true),
        )
        .await
        .unwrap();
    provider.fail(Operation::RemoveItems, ProviderFault::new(E_FAIL));

    let err = session
        .read(
            vec!["Random.Int4", "Random.String"],
            ReadOptions::new().group("G").sync(true).rebuild(true),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "RemoveItems: -2147467259");

    let entry = session.registry().get("G").unwrap();
    let sub = &entry.sub_groups()[0];
    assert!(sub.is_consistent());
    assert_eq!(sub.requested(), sub.valid());
    assert_eq!(
        provider.group_items("G.0"),
        vec!["Random.Int4".to_string(), "Random.Real8".to_string()]
    );

    let results = many(
        session
            .read(
                vec!["Random.Int4", "Random.Real8"],
                ReadOptions::new().group("G").sync(true),
            )
            .await
            .unwrap(),
    );
    assert_eq!(tags_of(&results), ["Random.Int4", "Random.Real8"]);
}

#[tokio::test]
async fn test_group_partitioned_by_size() {
    let (mut session, provider) = connected().await;
    let tags = vec![
        "Random.Int1",
        "Random.Int2",
        "Random.Int4",
        "Random.Real4",
        "Random.Real8",
    ];

    let results = many(
        session
            .read(tags.clone(), ReadOptions::new().group("P").size(2).sync(true))
            .await
            .unwrap(),
    );
    assert_eq!(tags_of(&results), tags);
    assert_eq!(session.registry().get("P").unwrap().len(), 3);
    assert_eq!(
        provider.group_names(),
        vec![
            Some("P.0".to_string()),
            Some("P.1".to_string()),
            Some("P.2".to_string())
        ]
    );

    // Shrinking drops the sub-groups past the new count.
    session
        .read(
            vec!["Random.Int1", "Random.Int2"],
            ReadOptions::new().group("P").size(2).sync(true).rebuild(true),
        )
        .await
        .unwrap();
    assert_eq!(session.registry().get("P").unwrap().len(), 1);
    assert_eq!(provider.group_count(), 1);

    // Growing creates the missing ones.
    let results = many(
        session
            .read(
                vec!["Random.Int1", "Random.Int2", "Random.String", "Random.Boolean"],
                ReadOptions::new().group("P").size(2).sync(true).rebuild(true),
            )
            .await
            .unwrap(),
    );
    assert_eq!(results.len(), 4);
    assert_eq!(session.registry().get("P").unwrap().len(), 2);
    assert_eq!(provider.group_count(), 2);
}

#[tokio::test]
async fn test_group_include_error_on_cache_hit() {
    let (mut session, _provider) = connected().await;
    let options = ReadOptions::new().group("G").include_error(true);

    session
        .read(vec!["Random.Int4", "Bogus.Tag"], options.clone())
        .await
        .unwrap();
    let results = many(
        session
            .read(vec!["Random.Int4", "Bogus.Tag"], options)
            .await
            .unwrap(),
    );
    assert_eq!(
        results[1].error.as_deref(),
        Some("The item ID is not defined in the server address space or no longer exists.")
    );
}

#[tokio::test]
async fn test_group_remove_is_idempotent() {
    let (mut session, provider) = connected().await;
    session
        .read(vec!["Random.Int4"], ReadOptions::new().group("G"))
        .await
        .unwrap();

    assert!(session.remove("G").await.unwrap());
    assert!(session.groups().is_empty());
    assert_eq!(provider.group_count(), 0);
    assert_eq!(provider.calls(Operation::CloseEvents), 1);

    assert!(!session.remove("G").await.unwrap());
    assert!(!session.remove(vec!["Unknown", "G"]).await.unwrap());
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_write_partial_failure() {
    let (mut session, provider) = connected().await;

    let output = session
        .write(
            vec![
                ("Bogus.Tag", Value::Int32(1)),
                ("Bucket Brigade.Int4", Value::Int32(42)),
            ],
            WriteOptions::new(),
        )
        .await
        .unwrap();

    let WriteOutput::Many(results) = output else {
        panic!("expected a list");
    };
    assert_eq!(results[0].tag, "Bogus.Tag");
    assert_eq!(results[0].status, WriteStatus::Error);
    assert_eq!(results[1].status, WriteStatus::Success);
    assert_eq!(
        provider.value("Bucket Brigade.Int4"),
        Some(Value::Int32(42))
    );
    assert_eq!(provider.group_count(), 0);
}

#[tokio::test]
async fn test_write_single_pair_shape() {
    let (mut session, _provider) = connected().await;

    let output = session
        .write(("Random.Int4", 5), WriteOptions::new().include_error(true))
        .await
        .unwrap();

    let WriteOutput::Single(reading) = output else {
        panic!("expected a single status");
    };
    assert_eq!(reading.status, WriteStatus::Error);
    assert_eq!(
        reading.error.as_deref(),
        Some("The item's access rights do not allow the operation.")
    );
}

#[tokio::test]
async fn test_write_chunks_use_fresh_groups() {
    let (mut session, provider) = connected().await;

    let output = session
        .write(
            vec![
                ("Bucket Brigade.Int4", Value::Int32(1)),
                ("Bucket Brigade.Real8", Value::Float64(2.5)),
                ("Bucket Brigade.String", Value::from("on")),
            ],
            WriteOptions::new().size(2),
        )
        .await
        .unwrap();

    assert!(matches!(output, WriteOutput::Many(ref r) if r.len() == 3));
    assert_eq!(provider.calls(Operation::AddGroup), 2);
    assert_eq!(provider.calls(Operation::RemoveGroup), 2);
    assert_eq!(provider.writes().len(), 3);
}

#[tokio::test]
async fn test_write_client_handles_start_at_one() {
    let (mut session, provider) = connected().await;
    session
        .write(
            vec![
                ("Bucket Brigade.Int4", Value::Int32(1)),
                ("Bucket Brigade.Real8", Value::Float64(2.0)),
            ],
            WriteOptions::new(),
        )
        .await
        .unwrap();

    let handles: Vec<u32> = provider.added_items().iter().map(|(_, h)| h.0).collect();
    assert_eq!(handles, vec![1, 2]);
}

#[tokio::test]
async fn test_write_fault_is_provider_error() {
    let (mut session, provider) = connected().await;
    provider.fail(
        Operation::SyncWrite,
        ProviderFault::new(E_FAIL).with_platform_message("Access denied"),
    );

    let err = session
        .write(("Bucket Brigade.Int4", 9), WriteOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "SyncWrite: Access denied");
    assert_eq!(provider.group_count(), 0);
}

#[tokio::test]
async fn test_iwrite_writes_one_chunk_at_a_time() {
    let (mut session, provider) = connected().await;

    let mut cursor = session
        .iwrite(
            vec![
                ("Bucket Brigade.Int4", Value::Int32(3)),
                ("Bucket Brigade.Boolean", Value::Bool(true)),
            ],
            WriteOptions::new().size(1),
        )
        .unwrap();

    let first = cursor.next().await.unwrap().unwrap();
    assert_eq!(first.status, WriteStatus::Success);
    assert_eq!(provider.calls(Operation::SyncWrite), 1);

    let second = cursor.next().await.unwrap().unwrap();
    assert_eq!(second.tag, "Bucket Brigade.Boolean");
    assert!(cursor.next().await.is_none());
    assert_eq!(provider.calls(Operation::SyncWrite), 2);
}

#[tokio::test]
async fn test_set_then_get() {
    let (mut session, _provider) = connected().await;

    assert_eq!(
        session.set("Bucket Brigade.Real8", 2.5).await.unwrap(),
        WriteStatus::Success
    );
    assert_eq!(
        session.get("Bucket Brigade.Real8").await.unwrap(),
        Some(Value::Float64(2.5))
    );
    assert_eq!(
        session.set("Random.Real8", 1.0).await.unwrap(),
        WriteStatus::Error
    );
}

// =============================================================================
// Close
// =============================================================================

#[tokio::test]
async fn test_close_removes_groups_and_disconnects() {
    let (mut session, provider) = connected().await;
    session
        .read(vec!["Random.Int4"], ReadOptions::new().group("A"))
        .await
        .unwrap();
    session
        .read(vec!["Random.Real8"], ReadOptions::new().group("B").sync(true))
        .await
        .unwrap();
    assert_eq!(provider.group_count(), 2);

    session.close().await.unwrap();
    assert!(session.groups().is_empty());
    assert!(!session.is_connected());
    assert_eq!(provider.calls(Operation::RemoveGroup), 2);
    assert_eq!(provider.connected_server(), None);
}

#[tokio::test]
async fn test_close_swallows_group_removal_failures() {
    let (mut session, provider) = connected().await;
    session
        .read(vec!["Random.Int4"], ReadOptions::new().group("A").sync(true))
        .await
        .unwrap();
    provider.fail(Operation::RemoveGroup, ProviderFault::new(E_FAIL));

    session.close().await.unwrap();
    assert!(session.groups().is_empty());
    assert_eq!(provider.calls(Operation::Disconnect), 1);
}

#[tokio::test]
async fn test_close_propagates_disconnect_failure() {
    let (mut session, provider) = connected().await;
    provider.fail(
        Operation::Disconnect,
        ProviderFault::new(E_FAIL).with_provider_message("Server busy"),
    );

    let err = session.close().await.unwrap_err();
    assert_eq!(err.to_string(), "Disconnect: Server busy");
}
