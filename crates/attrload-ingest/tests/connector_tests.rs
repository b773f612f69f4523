//! Connector setup and cycle tests against the in-memory sink
//!
//! These tests cover:
//! - Schema resolution from an existing table or from configured text
//! - Table creation options
//! - Setup failures (missing schema, bad schema, bad config)
//! - Cycle pulling, routing and temporal conversion

use attrload_common::{AttributeSet, InputItem};
use attrload_ingest::batch::FailureCause;
use attrload_ingest::coerce::TypedValue;
use attrload_ingest::config::ConnectorConfig;
use attrload_ingest::connector::Connector;
use attrload_ingest::error::{ConfigError, IngestError, SchemaError};
use attrload_ingest::schema::parse;
use attrload_ingest::sink::{MemorySink, Sink};
use attrload_ingest::source::QueueSource;
use std::sync::Arc;

fn config(schema: Option<&str>) -> ConnectorConfig {
    let mut config = ConnectorConfig::new("http://localhost:9191", "events");
    config.schema = schema.map(str::to_string);
    config
}

fn item(pairs: &[(&str, &str)]) -> InputItem {
    InputItem::new(pairs.iter().copied().collect::<AttributeSet>())
}

// ============================================================================
// Setup
// ============================================================================

#[tokio::test]
async fn test_existing_table_dictates_schema() {
    let existing = parse("id|Long|$primary_key,name").unwrap();
    let sink = Arc::new(MemorySink::new().with_table("events", existing.clone()));

    let connector = Connector::setup(sink.clone(), &config(Some("other|Double")))
        .await
        .unwrap();

    assert_eq!(**connector.schema(), existing);
    assert_eq!(connector.table(), "events");
    assert!(connector.sink().has_table("events").await.unwrap());
    assert!(sink.rows("events").await.is_empty());
}

#[tokio::test]
async fn test_missing_table_is_created_from_schema_text() {
    let sink = Arc::new(MemorySink::new());
    let mut config = config(Some("x|Float|data,y|Float|data"));
    config.collection_name = Some("ingest".to_string());
    config.replicate_table = true;

    let connector = Connector::setup(sink.clone(), &config).await.unwrap();
    assert_eq!(connector.schema().len(), 2);

    let options = sink.table_options("events").await.unwrap();
    assert_eq!(options.collection_name, "ingest");
    assert!(options.is_replicated);
}

#[tokio::test]
async fn test_missing_table_without_schema_fails() {
    let err = Connector::setup(MemorySink::new(), &config(None))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, IngestError::MissingSchema { ref table } if table == "events"));
}

#[tokio::test]
async fn test_invalid_schema_text_is_fatal() {
    let err = Connector::setup(MemorySink::new(), &config(Some("a|Decimal")))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, IngestError::Schema(SchemaError::InvalidDataType { .. })));
    assert!(err.to_string().contains("invalid data type"));
}

#[tokio::test]
async fn test_lookup_failure_is_treated_as_absent_table() {
    let sink = Arc::new(MemorySink::new());
    sink.fail_lookups(true).await;

    Connector::setup(sink.clone(), &config(Some("id|Long")))
        .await
        .unwrap();

    assert!(sink.table_options("events").await.is_some());
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let mut config = config(Some("id|Long"));
    config.batch_size = 0;

    let err = Connector::setup(MemorySink::new(), &config).await.err().unwrap();
    assert!(matches!(err, IngestError::Config(ConfigError::InvalidBatchSize)));
}

// ============================================================================
// Cycles
// ============================================================================

#[tokio::test]
async fn test_empty_pull_touches_nothing() {
    let sink = Arc::new(MemorySink::new());
    let connector = Connector::setup(sink.clone(), &config(Some("id|Long")))
        .await
        .unwrap();

    let result = connector.run_cycle(&mut QueueSource::new()).await;

    assert!(result.outcome.is_empty());
    assert_eq!(result.report.items, 0);
    assert!(sink.batch_sizes().await.is_empty());
}

#[tokio::test]
async fn test_cycle_pulls_at_most_one_batch() {
    let sink = Arc::new(MemorySink::new());
    let mut config = config(Some("id|Long,name"));
    config.batch_size = 2;
    let connector = Connector::setup(sink.clone(), &config).await.unwrap();

    let mut source: QueueSource = (0..5)
        .map(|i| item(&[("id", i.to_string().as_str()), ("name", "n")]))
        .collect();

    let first = connector.run_cycle(&mut source).await;
    assert_eq!(first.report.items, 2);
    assert_eq!(first.report.auto_flushes, 1);
    assert_eq!(first.report.final_flush_records, 0);
    assert_eq!(source.len(), 3);

    let mut total = first.report.succeeded;
    while !source.is_empty() {
        total += connector.run_cycle(&mut source).await.report.succeeded;
    }
    assert_eq!(total, 5);
    assert_eq!(sink.rows("events").await.len(), 5);
}

#[tokio::test]
async fn test_cycle_routes_each_item_once() {
    // a table that predates setup may repeat a column name
    let existing = parse("id|Long|$primary_key,score|Double,note,note").unwrap();
    let sink = Arc::new(MemorySink::new().with_table("events", existing));
    let connector = Connector::setup(sink.clone(), &config(None)).await.unwrap();

    let mut source: QueueSource = vec![
        item(&[("id", "1"), ("score", "0.5")]),
        item(&[("id", "2"), ("score", "NaN")]),
        item(&[("score", "1.0")]),
        item(&[("id", "3"), ("score", "oops"), ("note", "dup")]),
    ]
    .into_iter()
    .collect();

    let result = connector.run_cycle(&mut source).await;

    assert_eq!(result.report.items, 4);
    assert_eq!(result.report.succeeded, 2);
    assert_eq!(result.report.failed, 2);

    let causes: Vec<_> = result.outcome.failed.iter().map(|f| &f.cause).collect();
    assert!(causes.iter().any(|c| matches!(c, FailureCause::Build { .. })));
    assert!(causes.iter().any(|c| matches!(c, FailureCause::Insert { .. })));

    let rows = sink.rows("events").await;
    assert_eq!(rows[1].get("score"), Some(&TypedValue::Double(0.0)));
}

#[tokio::test]
async fn test_temporal_columns_become_epoch_millis() {
    let sink = Arc::new(MemorySink::new());
    let mut config = config(Some("ts|Long|timestamp,raw|Long|TIMESTAMP"));
    config.date_format = Some("yyyy-MM-dd HH:mm:ss".to_string());
    config.time_zone = Some("UTC".to_string());
    let connector = Connector::setup(sink.clone(), &config).await.unwrap();

    let mut source: QueueSource = vec![item(&[("ts", "2024-01-02 03:04:05"), ("raw", "1700000000")])]
        .into_iter()
        .collect();
    connector.run_cycle(&mut source).await;

    let rows = sink.rows("events").await;
    assert_eq!(rows[0].get("ts"), Some(&TypedValue::Long(1_704_164_645_000)));
    assert_eq!(rows[0].get("raw"), Some(&TypedValue::Long(1_700_000_000)));
}

#[tokio::test]
async fn test_unparsable_date_drops_field_only() {
    let sink = Arc::new(MemorySink::new());
    let mut config = config(Some("id|Long,ts|Long|timestamp"));
    config.date_format = Some("yyyy-MM-dd".to_string());
    let connector = Connector::setup(sink.clone(), &config).await.unwrap();

    let mut source: QueueSource = vec![item(&[("id", "1"), ("ts", "yesterday")])]
        .into_iter()
        .collect();
    let result = connector.run_cycle(&mut source).await;

    assert_eq!(result.report.succeeded, 1);
    let rows = sink.rows("events").await;
    assert!(!rows[0].contains("ts"));
}

#[tokio::test]
async fn test_update_on_existing_pk_replaces_rows() {
    let sink = Arc::new(MemorySink::new());
    let mut config = config(Some("id|Long|$primary_key,name"));
    config.update_on_existing_pk = true;
    let connector = Connector::setup(sink.clone(), &config).await.unwrap();

    let mut source: QueueSource = vec![
        item(&[("id", "1"), ("name", "first")]),
        item(&[("id", "1"), ("name", "second")]),
    ]
    .into_iter()
    .collect();
    let result = connector.run_cycle(&mut source).await;

    assert_eq!(result.report.succeeded, 2);
    let rows = sink.rows("events").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&TypedValue::String("second".to_string())));
}
