//! Coordinator tests against an in-memory session.
//!
//! The fake session hands back queued results and records every call, so
//! these tests can assert both the outcome of each entry point and the
//! exact statements and parameters it issued.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use verge_adapter::publish::EventPublisher;
use verge_adapter::{
    AdapterConfig, AdapterError, CreateRequest, DeleteRequest, GraphAdapter, PublishOptions,
    ReadRequest, RelationshipRequest, UpdateRequest,
};
use verge_core::events::MessageAttributes;
use verge_core::PropertyMap;
use verge_graph::{
    GraphError, GraphSession, GraphValue, NodeRef, NormalizedRecords, Record, RelationshipRef,
    WriteOutcome,
};

#[derive(Default)]
struct FakeSession {
    reads: Mutex<VecDeque<Vec<Record>>>,
    writes: Mutex<VecDeque<WriteOutcome>>,
    read_calls: Mutex<Vec<(String, PropertyMap)>>,
    write_calls: Mutex<Vec<(String, PropertyMap)>>,
    atomic_calls: Mutex<Vec<(String, PropertyMap)>>,
}

impl FakeSession {
    fn with_reads(reads: Vec<Vec<Record>>) -> Arc<Self> {
        let session = Self::default();
        *session.reads.lock().unwrap() = reads.into();
        Arc::new(session)
    }

    fn queue_write(&self, outcome: WriteOutcome) {
        self.writes.lock().unwrap().push_back(outcome);
    }

    fn read_calls(&self) -> Vec<(String, PropertyMap)> {
        self.read_calls.lock().unwrap().clone()
    }

    fn write_calls(&self) -> Vec<(String, PropertyMap)> {
        self.write_calls.lock().unwrap().clone()
    }

    fn atomic_calls(&self) -> Vec<(String, PropertyMap)> {
        self.atomic_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphSession for FakeSession {
    async fn run_read(&self, query: &str, params: &PropertyMap) -> Result<Vec<Record>, GraphError> {
        self.read_calls
            .lock()
            .unwrap()
            .push((query.to_string(), params.clone()));
        Ok(self.reads.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn run_write(
        &self,
        query: &str,
        params: &PropertyMap,
    ) -> Result<WriteOutcome, GraphError> {
        self.write_calls
            .lock()
            .unwrap()
            .push((query.to_string(), params.clone()));
        Ok(self.writes.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn write_atomic(
        &self,
        query: &str,
        params: &PropertyMap,
    ) -> Result<WriteOutcome, GraphError> {
        self.atomic_calls
            .lock()
            .unwrap()
            .push((query.to_string(), params.clone()));
        Ok(self.writes.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<(String, Value, MessageAttributes)>>,
}

impl RecordingPublisher {
    fn events(&self) -> Vec<(String, Value, MessageAttributes)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, destination: &str, payload: &Value, attributes: &MessageAttributes) {
        self.events
            .lock()
            .unwrap()
            .push((destination.to_string(), payload.clone(), attributes.clone()));
    }
}

fn props(value: Value) -> PropertyMap {
    value.as_object().unwrap().clone()
}

fn unit_node(id: i64, properties: Value) -> Record {
    vec![GraphValue::Node(NodeRef::new(
        id,
        vec!["Unit".to_string()],
        props(properties),
    ))]
}

fn publishing_config() -> AdapterConfig {
    AdapterConfig {
        destination: Some("arn:events".to_string()),
        ..Default::default()
    }
}

fn adapter(
    session: Arc<FakeSession>,
    publisher: Arc<RecordingPublisher>,
    config: AdapterConfig,
) -> GraphAdapter {
    GraphAdapter::new(session, publisher, config).unwrap()
}

fn committed(rows: usize) -> WriteOutcome {
    WriteOutcome {
        records: vec![unit_node(1, json!({"test_id": "abc"}))],
        rows_affected: rows,
    }
}

fn props_param(params: &PropertyMap) -> PropertyMap {
    let text = params["props"].as_str().unwrap();
    serde_json::from_str::<Value>(text)
        .unwrap()
        .as_object()
        .unwrap()
        .clone()
}

#[tokio::test]
async fn create_writes_atomically_and_publishes() {
    let session = FakeSession::with_reads(vec![]);
    session.queue_write(committed(1));
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher.clone(), publishing_config());

    let payload = props(json!({"test_id": "abc", "status": "alpha"}));
    let created = adapter
        .create(CreateRequest {
            label: "Unit".to_string(),
            payload: payload.clone(),
            publish: PublishOptions::default(),
        })
        .await
        .unwrap();

    assert_eq!(created, payload);

    let calls = session.atomic_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.contains("CREATE (n:Unit)"));
    assert!(calls[0].0.contains("apoc.convert.fromJsonMap($props)"));
    assert_eq!(props_param(&calls[0].1), payload);

    let events = publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "arn:events");
    assert_eq!(events[0].1, Value::Object(payload));
    assert_eq!(events[0].2["operation"].string_value, "create");
}

#[tokio::test]
async fn create_validates_before_any_io() {
    let session = FakeSession::with_reads(vec![]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher.clone(), publishing_config());

    let missing_label = adapter
        .create(CreateRequest {
            label: "  ".to_string(),
            payload: props(json!({"test_id": "abc"})),
            publish: PublishOptions::default(),
        })
        .await;
    assert!(matches!(missing_label, Err(AdapterError::Validation(_))));

    let empty_payload = adapter
        .create(CreateRequest {
            label: "Unit".to_string(),
            payload: PropertyMap::new(),
            publish: PublishOptions::default(),
        })
        .await;
    assert!(matches!(empty_payload, Err(AdapterError::Validation(_))));

    assert!(session.atomic_calls().is_empty());
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn read_groups_entities_by_label() {
    let session = FakeSession::with_reads(vec![vec![unit_node(1, json!({"test_id": "abc"}))]]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session, publisher, AdapterConfig::default());

    let result = adapter
        .read(ReadRequest {
            query: "MATCH (n:Unit) RETURN n".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.entities("Unit")[0]["test_id"], json!("abc"));
}

#[tokio::test]
async fn read_returns_raw_records_when_serialize_off() {
    let records = vec![vec![GraphValue::Scalar(json!(7))]];
    let session = FakeSession::with_reads(vec![records.clone()]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session, publisher, AdapterConfig::default());

    let result = adapter
        .read(ReadRequest {
            query: "MATCH (n) RETURN count(n)".to_string(),
            serialize: false,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result, NormalizedRecords::Raw(records));
}

#[tokio::test]
async fn query_requires_a_placeholder_marker() {
    let session = FakeSession::with_reads(vec![]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    let result = adapter.query("MATCH (n:Unit) RETURN n", None).await;
    assert!(matches!(result, Err(AdapterError::Validation(_))));
    assert!(session.read_calls().is_empty());
}

#[tokio::test]
async fn query_coerces_integer_placeholder_strings() {
    let session = FakeSession::with_reads(vec![vec![]]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    let placeholder = props(json!({"limit": "5", "name": "NaN"}));
    adapter
        .query("MATCH (n:Unit) RETURN n LIMIT $limit", Some(&placeholder))
        .await
        .unwrap();

    let calls = session.read_calls();
    assert_eq!(calls[0].1["limit"], json!(5));
    assert_eq!(calls[0].1["name"], json!("NaN"));
}

#[tokio::test]
async fn update_merges_snapshot_and_writes_conditionally() {
    let snapshot = json!({"id": "abc", "version": 1, "status": "alpha"});
    let session = FakeSession::with_reads(vec![vec![unit_node(1, snapshot)]]);
    session.queue_write(committed(1));
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher.clone(), publishing_config());

    let merged = adapter
        .update(UpdateRequest {
            label: "Unit".to_string(),
            payload: props(json!({"status": "beta", "version": 2})),
            original_idempotence_value: Some(json!(1)),
            query: "MATCH (n:Unit) WHERE n.id = $id RETURN n".to_string(),
            placeholder: Some(props(json!({"id": "abc"}))),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(
        Value::Object(merged.clone()),
        json!({"id": "abc", "version": 2, "status": "beta"})
    );

    // The snapshot read used the caller's query and cleaned placeholders.
    let reads = session.read_calls();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].1["id"], json!("abc"));

    // One atomic conditional write carrying the merged payload.
    let writes = session.atomic_calls();
    assert_eq!(writes.len(), 1);
    let (query, params) = &writes[0];
    assert!(query.contains("MATCH (n:Unit)"));
    assert!(query.contains("n.id = $identifier_value"));
    assert!(query.contains("n.version = $original_idempotence_value"));
    assert!(query.contains("SET n = apoc.convert.fromJsonMap($props)"));
    assert_eq!(params["identifier_value"], json!("abc"));
    assert_eq!(params["original_idempotence_value"], json!(1));
    assert_eq!(props_param(params), merged);

    let events = publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, Value::Object(merged));
    assert_eq!(events[0].2["operation"].string_value, "update");
}

#[tokio::test]
async fn update_honors_request_level_field_names() {
    let snapshot = json!({"test_id": "abc", "revision": 4, "status": "alpha"});
    let session = FakeSession::with_reads(vec![vec![unit_node(1, snapshot)]]);
    session.queue_write(committed(1));
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    adapter
        .update(UpdateRequest {
            label: "Unit".to_string(),
            payload: props(json!({"status": "beta"})),
            identifier: Some("test_id".to_string()),
            idempotence_key: Some("revision".to_string()),
            original_idempotence_value: Some(json!(4)),
            query: "MATCH (n:Unit) RETURN n".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let writes = session.atomic_calls();
    let (query, params) = &writes[0];
    assert!(query.contains("n.test_id = $identifier_value"));
    assert!(query.contains("n.revision = $original_idempotence_value"));
    assert_eq!(params["identifier_value"], json!("abc"));
    assert_eq!(params["original_idempotence_value"], json!(4));
}

#[tokio::test]
async fn update_conflict_when_conditional_write_matches_nothing() {
    let snapshot = json!({"id": "abc", "version": 1, "status": "alpha"});
    let session = FakeSession::with_reads(vec![vec![unit_node(1, snapshot)]]);
    session.queue_write(WriteOutcome::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher.clone(), publishing_config());

    let result = adapter
        .update(UpdateRequest {
            label: "Unit".to_string(),
            payload: props(json!({"status": "beta"})),
            original_idempotence_value: Some(json!(1)),
            query: "MATCH (n:Unit) RETURN n".to_string(),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(AdapterError::Conflict { .. })));
    assert_eq!(session.atomic_calls().len(), 1);
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn update_not_found_when_read_matches_nothing() {
    let session = FakeSession::with_reads(vec![vec![]]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    let result = adapter
        .update(UpdateRequest {
            label: "Unit".to_string(),
            payload: props(json!({"status": "beta"})),
            original_idempotence_value: Some(json!(1)),
            query: "MATCH (n:Unit) RETURN n".to_string(),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(AdapterError::NotFound { .. })));
    assert!(session.atomic_calls().is_empty());
}

#[tokio::test]
async fn update_rejects_missing_original_idempotence_value() {
    let session = FakeSession::with_reads(vec![]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    for original in [None, Some(Value::Null)] {
        let result = adapter
            .update(UpdateRequest {
                label: "Unit".to_string(),
                payload: props(json!({"status": "beta"})),
                original_idempotence_value: original,
                query: "MATCH (n:Unit) RETURN n".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AdapterError::Validation(_))));
    }

    assert!(session.read_calls().is_empty());
}

#[tokio::test]
async fn update_rejects_empty_read_query() {
    let session = FakeSession::with_reads(vec![]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    let result = adapter
        .update(UpdateRequest {
            label: "Unit".to_string(),
            payload: props(json!({"status": "beta"})),
            original_idempotence_value: Some(json!(1)),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(AdapterError::Validation(_))));
    assert!(session.read_calls().is_empty());
}

#[tokio::test]
async fn delete_short_circuits_when_entity_missing() {
    let session = FakeSession::with_reads(vec![vec![]]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher.clone(), publishing_config());

    let result = adapter
        .delete(DeleteRequest {
            label: "Unit".to_string(),
            delete_identifier: Some(json!("abc")),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(result.is_empty());
    assert!(session.write_calls().is_empty());
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn delete_returns_snapshot_and_publishes() {
    let snapshot = json!({"id": "abc", "status": "alpha"});
    let session = FakeSession::with_reads(vec![vec![unit_node(1, snapshot.clone())]]);
    session.queue_write(WriteOutcome::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher.clone(), publishing_config());

    let deleted = adapter
        .delete(DeleteRequest {
            label: "Unit".to_string(),
            delete_identifier: Some(json!("abc")),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(Value::Object(deleted.clone()), snapshot);

    let writes = session.write_calls();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].0.contains("DETACH DELETE n"));
    assert_eq!(writes[0].1["delete_identifier"], json!("abc"));

    let events = publisher.events();
    assert_eq!(events[0].1, snapshot);
    assert_eq!(events[0].2["operation"].string_value, "delete");
}

#[tokio::test]
async fn delete_uses_caller_supplied_query() {
    let session = FakeSession::with_reads(vec![vec![unit_node(1, json!({"id": "abc"}))]]);
    session.queue_write(WriteOutcome::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    adapter
        .delete(DeleteRequest {
            label: "Unit".to_string(),
            delete_identifier: Some(json!("abc")),
            delete_query: Some(
                "MATCH (n:Unit) WHERE n.id = $delete_identifier DELETE n".to_string(),
            ),
            ..Default::default()
        })
        .await
        .unwrap();

    let writes = session.write_calls();
    assert!(writes[0].0.ends_with("DELETE n"));
    assert!(!writes[0].0.contains("DETACH"));
}

#[tokio::test]
async fn create_relationship_requires_edge_pattern() {
    let session = FakeSession::with_reads(vec![]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    let result = adapter
        .create_relationship(RelationshipRequest {
            query: "MATCH (a:Unit) RETURN a".to_string(),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(AdapterError::Validation(_))));
    assert!(session.write_calls().is_empty());
}

#[tokio::test]
async fn create_relationship_publishes_raw_write_result() {
    let session = FakeSession::with_reads(vec![]);
    session.queue_write(WriteOutcome {
        records: vec![vec![GraphValue::Relationship(RelationshipRef::new(
            1,
            2,
            "LINKS",
            props(json!({"weight": 1})),
        ))]],
        rows_affected: 1,
    });
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher.clone(), publishing_config());

    let records = adapter
        .create_relationship(RelationshipRequest {
            query: "MATCH (a:Unit), (b:Unit) CREATE (a)-[r:LINKS {weight: 1}]->(b) RETURN r"
                .to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(records.len(), 1);

    let events = publisher.events();
    assert_eq!(events[0].1, json!([[{"weight": 1}]]));
    assert_eq!(events[0].2["operation"].string_value, "create");
}

#[tokio::test]
async fn delete_relationship_requires_delete_clause() {
    let session = FakeSession::with_reads(vec![]);
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    let result = adapter
        .delete_relationship(RelationshipRequest {
            query: "MATCH (a)-[r:LINKS]->(b) RETURN r".to_string(),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(AdapterError::Validation(_))));
    assert!(session.write_calls().is_empty());
}

#[tokio::test]
async fn delete_relationship_accepts_lowercase_delete() {
    let session = FakeSession::with_reads(vec![]);
    session.queue_write(WriteOutcome::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session.clone(), publisher, AdapterConfig::default());

    adapter
        .delete_relationship(RelationshipRequest {
            query: "MATCH (a)-[r:LINKS]->(b) delete r".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(session.write_calls().len(), 1);
}

#[tokio::test]
async fn schema_projection_trims_create_payloads() {
    let schema = "\
components:
  schemas:
    Unit:
      type: object
      properties:
        test_id:
          type: string
        status:
          type: string
";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(schema.as_bytes()).unwrap();

    let session = FakeSession::with_reads(vec![]);
    session.queue_write(committed(1));
    let publisher = Arc::new(RecordingPublisher::default());
    let config = AdapterConfig {
        schema_file: Some(file.path().to_string_lossy().into_owned()),
        schema_name: Some("Unit".to_string()),
        ..Default::default()
    };
    let adapter = adapter(session.clone(), publisher, config);

    let created = adapter
        .create(CreateRequest {
            label: "Unit".to_string(),
            payload: props(json!({"test_id": "abc", "status": "alpha", "stray": true})),
            publish: PublishOptions::default(),
        })
        .await
        .unwrap();

    assert!(!created.contains_key("stray"));
    assert!(!props_param(&session.atomic_calls()[0].1).contains_key("stray"));
}

#[tokio::test]
async fn publish_merges_default_and_call_attributes() {
    let session = FakeSession::with_reads(vec![]);
    session.queue_write(committed(1));
    let publisher = Arc::new(RecordingPublisher::default());
    let config = AdapterConfig {
        destination: Some("arn:events".to_string()),
        default_attributes: props(json!({"source": "graph", "team": "data"}))
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let adapter = adapter(session, publisher.clone(), config);

    adapter
        .create(CreateRequest {
            label: "Unit".to_string(),
            payload: props(json!({"test_id": "abc"})),
            publish: PublishOptions {
                attributes: props(json!({"source": "manual", "skipped": null}))
                    .into_iter()
                    .collect(),
            },
        })
        .await
        .unwrap();

    let attributes = &publisher.events()[0].2;
    assert_eq!(attributes["operation"].string_value, "create");
    assert_eq!(attributes["source"].string_value, "manual");
    assert_eq!(attributes["team"].string_value, "data");
    assert!(!attributes.contains_key("skipped"));
}

#[tokio::test]
async fn no_destination_means_no_events() {
    let session = FakeSession::with_reads(vec![]);
    session.queue_write(committed(1));
    let publisher = Arc::new(RecordingPublisher::default());
    let adapter = adapter(session, publisher.clone(), AdapterConfig::default());

    adapter
        .create(CreateRequest {
            label: "Unit".to_string(),
            payload: props(json!({"test_id": "abc"})),
            publish: PublishOptions::default(),
        })
        .await
        .unwrap();

    assert!(publisher.events().is_empty());
}
