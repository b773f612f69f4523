//! HTTP sink tests against a mock server
//!
//! These tests validate request bodies, response decoding and the mapping of
//! server errors to `SinkError`.

use attrload_ingest::coerce::TypedValue;
use attrload_ingest::error::SinkError;
use attrload_ingest::record::TypedRecord;
use attrload_ingest::schema::{parse, ColumnType};
use attrload_ingest::sink::{CreateTableOptions, HttpSink, InsertOptions, Sink};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_json, header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn sink(server: &MockServer) -> HttpSink {
    HttpSink::new(server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_has_table() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/has/table"))
        .and(body_json(json!({"table_name": "events"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"table_exists": true})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(sink(&server).has_table("events").await.unwrap());
}

#[tokio::test]
async fn test_table_schema_decodes_columns() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/show/table"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "columns": [
                {"name": "id", "type": "long", "annotations": [], "primary_key_ordinal": 0},
                {"name": "ts", "type": "long", "annotations": ["timestamp"], "primary_key_ordinal": null}
            ]
        })))
        .mount(&server)
        .await;

    let schema = sink(&server).table_schema("events").await.unwrap();
    assert_eq!(schema.len(), 2);
    assert_eq!(schema.columns()[0].column_type, ColumnType::Long);
    assert!(schema.columns()[0].is_primary_key());
    assert!(schema.columns()[1].is_temporal());
}

#[tokio::test]
async fn test_table_schema_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/show/table"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "no such table"})))
        .mount(&server)
        .await;

    let err = sink(&server).table_schema("events").await.unwrap_err();
    assert!(matches!(err, SinkError::TableNotFound(ref t) if t == "events"));
}

#[tokio::test]
async fn test_create_table_sends_schema_and_options() {
    let server = MockServer::start().await;
    let schema = parse("id|Long|$primary_key,name").unwrap();

    Mock::given(method("POST"))
        .and(path("/create/table"))
        .and(body_json(json!({
            "table_name": "events",
            "columns": [
                {"name": "id", "type": "long", "annotations": [], "primary_key_ordinal": 0},
                {"name": "name", "type": "string", "annotations": []}
            ],
            "options": {"collection_name": "ingest", "is_replicated": false}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let options = CreateTableOptions {
        collection_name: "ingest".to_string(),
        is_replicated: false,
    };
    sink(&server)
        .create_table("events", &schema, &options)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_insert_records_sends_typed_values() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/insert/records"))
        .and(body_json(json!({
            "table_name": "events",
            "records": [{"id": 1, "score": 0.5, "name": "a"}],
            "options": {"update_on_existing_pk": true}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"count_inserted": 0, "count_updated": 1})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record = TypedRecord::new()
        .with("id", TypedValue::Long(1))
        .with("score", TypedValue::Double(0.5))
        .with("name", TypedValue::String("a".to_string()));

    let response = sink(&server)
        .insert_records(
            "events",
            &[record],
            &InsertOptions {
                update_on_existing_pk: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(response.count_updated, 1);
}

#[tokio::test]
async fn test_rejection_carries_server_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/insert/records"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "bad column"})))
        .mount(&server)
        .await;

    let err = sink(&server)
        .insert_records("events", &[TypedRecord::new()], &InsertOptions::default())
        .await
        .unwrap_err();

    match err {
        SinkError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "bad column");
        },
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_response_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/has/table"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = sink(&server).has_table("events").await.unwrap_err();
    assert!(matches!(err, SinkError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_credentials_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/has/table"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"table_exists": false})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink(&server).with_credentials("admin", "secret");
    assert!(!sink.has_table("events").await.unwrap());
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    let sink = HttpSink::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
    let err = sink.has_table("events").await.unwrap_err();
    assert!(matches!(err, SinkError::Transport(_)));
}

#[test]
fn test_base_url_trailing_slash_is_trimmed() {
    let sink = HttpSink::new("http://localhost:9191/", Duration::from_secs(1)).unwrap();
    assert_eq!(sink.base_url(), "http://localhost:9191");
}
