//! The mutation coordinator: thin CRUD entry points around one non-trivial
//! operation, the optimistic-concurrency update.
//!
//! Update sequences VALIDATE, READ_CURRENT, MERGE, PROJECT,
//! WRITE_CONDITIONAL, PUBLISH. The snapshot is re-fetched on every attempt
//! and the single conditional write requires the idempotence field to still
//! equal the value the caller observed; a concurrent writer that advanced
//! it first makes the write match nothing, which surfaces as a conflict.
//! There is no internal retry — callers re-read and resubmit.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use verge_core::events::{format_attributes, Operation};
use verge_core::merge::{merge, MergeOptions};
use verge_core::schema::{self, SchemaNode};
use verge_core::PropertyMap;
use verge_graph::params::clean_placeholders;
use verge_graph::value::records_to_json;
use verge_graph::{normalize, GraphError, GraphSession, NormalizeOptions, NormalizedRecords, Record};

use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::publish::EventPublisher;

/// Per-call publish overrides. Attributes of the same name win over the
/// adapter-level defaults.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub attributes: BTreeMap<String, Value>,
}

/// Arguments for [`GraphAdapter::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub label: String,
    pub payload: PropertyMap,
    pub publish: PublishOptions,
}

/// Arguments for [`GraphAdapter::read`].
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub query: String,
    pub placeholder: Option<PropertyMap>,
    pub label: Option<String>,
    pub serialize: bool,
    pub search: bool,
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            placeholder: None,
            label: None,
            serialize: true,
            search: false,
        }
    }
}

/// Arguments for [`GraphAdapter::update`].
///
/// `identifier` and `idempotence_key` fall back to the adapter
/// configuration when unset.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub label: String,
    pub payload: PropertyMap,
    pub identifier: Option<String>,
    pub idempotence_key: Option<String>,
    pub original_idempotence_value: Option<Value>,
    pub query: String,
    pub placeholder: Option<PropertyMap>,
    pub merge: MergeOptions,
    pub publish: PublishOptions,
}

/// Arguments for [`GraphAdapter::delete`].
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    pub label: String,
    pub identifier: Option<String>,
    pub delete_identifier: Option<Value>,
    pub delete_query: Option<String>,
    pub publish: PublishOptions,
}

/// Arguments for the relationship entry points.
#[derive(Debug, Clone, Default)]
pub struct RelationshipRequest {
    pub query: String,
    pub placeholder: Option<PropertyMap>,
    pub publish: PublishOptions,
}

/// The adapter over one logical graph session.
///
/// Holds no mutable state of its own: the session handle is the only
/// shared resource, and snapshots are re-read per update attempt rather
/// than cached.
pub struct GraphAdapter {
    session: Arc<dyn GraphSession>,
    publisher: Arc<dyn EventPublisher>,
    config: AdapterConfig,
    schema: Option<SchemaNode>,
}

impl GraphAdapter {
    /// Build an adapter. Loads the projection schema once when the
    /// configuration names one.
    pub fn new(
        session: Arc<dyn GraphSession>,
        publisher: Arc<dyn EventPublisher>,
        config: AdapterConfig,
    ) -> Result<Self> {
        let schema = match (&config.schema_file, &config.schema_name) {
            (Some(file), Some(name)) => Some(schema::load_schema(file, name)?),
            _ => None,
        };
        Ok(Self {
            session,
            publisher,
            config,
            schema,
        })
    }

    /// Create one entity and publish a `create` event with its payload.
    pub async fn create(&self, request: CreateRequest) -> Result<PropertyMap> {
        let label = required(&request.label, "node label")?;
        if request.payload.is_empty() {
            return Err(AdapterError::Validation(
                "create payload must not be empty".to_string(),
            ));
        }

        let payload = self.apply_schema(request.payload);
        let query = format!("CREATE (n:{label}) SET n = apoc.convert.fromJsonMap($props) RETURN n");
        let params = props_params(&payload)?;
        self.session.write_atomic(&query, &params).await?;

        tracing::debug!(label, "Created entity");
        self.publish(Operation::Create, Value::Object(payload.clone()), &request.publish)
            .await;
        Ok(payload)
    }

    /// Run a caller-supplied read and normalize the results.
    pub async fn read(&self, request: ReadRequest) -> Result<NormalizedRecords> {
        required(&request.query, "read query")?;

        let placeholder = clean_placeholders(request.placeholder.as_ref());
        let records = self.session.run_read(&request.query, &placeholder).await?;
        let options = NormalizeOptions {
            label: request.label,
            serialize: request.serialize,
            search: request.search,
        };
        Ok(normalize(records, &options))
    }

    /// Apply a partial update under optimistic concurrency.
    ///
    /// Fails with [`AdapterError::NotFound`] when the read matches nothing
    /// and with [`AdapterError::Conflict`] when the conditional write
    /// affects zero rows. Returns the merged payload the write committed.
    pub async fn update(&self, request: UpdateRequest) -> Result<PropertyMap> {
        // VALIDATE: everything checked before any I/O.
        let label = required(&request.label, "node label")?.to_string();
        let identifier = self.resolve_field(request.identifier.as_deref(), &self.config.identifier, "identifier field")?;
        let idempotence_key = self.resolve_field(
            request.idempotence_key.as_deref(),
            &self.config.idempotence_key,
            "idempotence field",
        )?;
        let original_value = match &request.original_idempotence_value {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                return Err(AdapterError::Validation(
                    "original idempotence value is required".to_string(),
                ))
            }
        };
        required(&request.query, "read query")?;

        // READ_CURRENT: fresh snapshot, first match wins, extras ignored.
        let placeholder = clean_placeholders(request.placeholder.as_ref());
        let records = self.session.run_read(&request.query, &placeholder).await?;
        let normalized = normalize(
            records,
            &NormalizeOptions {
                label: Some(label.clone()),
                serialize: true,
                search: false,
            },
        );
        let snapshot = normalized
            .first_entity(&label)
            .or_else(|| normalized.first())
            .cloned()
            .ok_or_else(|| AdapterError::NotFound {
                label: label.clone(),
            })?;

        // MERGE + PROJECT.
        let merged = merge(&snapshot, &request.payload, request.merge);
        let merged = self.apply_schema(merged);

        // WRITE_CONDITIONAL: one atomic statement, matching the identifier
        // and the idempotence value observed before the merge.
        let identifier_value = merged
            .get(&identifier)
            .or_else(|| snapshot.get(&identifier))
            .cloned()
            .ok_or_else(|| {
                AdapterError::Validation(format!(
                    "identifier field {identifier} missing from entity"
                ))
            })?;

        let write_query = format!(
            "MATCH (n:{label})
             WHERE n.{identifier} = $identifier_value
               AND n.{idempotence_key} = $original_idempotence_value
             SET n = apoc.convert.fromJsonMap($props)
             RETURN n"
        );
        let mut params = props_params(&merged)?;
        params.insert("identifier_value".to_string(), identifier_value);
        params.insert("original_idempotence_value".to_string(), original_value);

        let outcome = self.session.write_atomic(&write_query, &params).await?;
        if outcome.rows_affected == 0 {
            return Err(AdapterError::Conflict { label });
        }

        // PUBLISH: fire-and-forget after the committed write.
        tracing::debug!(label, identifier = %identifier, "Updated entity");
        self.publish(Operation::Update, Value::Object(merged.clone()), &request.publish)
            .await;
        Ok(merged)
    }

    /// Delete one entity by identifier, returning its pre-delete snapshot.
    ///
    /// A missing entity short-circuits to an empty result with no write
    /// and no event.
    pub async fn delete(&self, request: DeleteRequest) -> Result<PropertyMap> {
        let label = required(&request.label, "node label")?.to_string();
        let identifier = self.resolve_field(request.identifier.as_deref(), &self.config.identifier, "identifier field")?;
        let delete_identifier = match &request.delete_identifier {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                return Err(AdapterError::Validation(
                    "delete identifier value is required".to_string(),
                ))
            }
        };

        let mut params = PropertyMap::new();
        params.insert("delete_identifier".to_string(), delete_identifier);

        let read_query =
            format!("MATCH (n:{label}) WHERE n.{identifier} = $delete_identifier RETURN n");
        let records = self.session.run_read(&read_query, &params).await?;
        let normalized = normalize(
            records,
            &NormalizeOptions {
                label: Some(label.clone()),
                serialize: true,
                search: false,
            },
        );
        let Some(snapshot) = normalized
            .first_entity(&label)
            .or_else(|| normalized.first())
            .cloned()
        else {
            return Ok(PropertyMap::new());
        };

        let write_query = request.delete_query.unwrap_or_else(|| {
            format!("MATCH (n:{label}) WHERE n.{identifier} = $delete_identifier DETACH DELETE n")
        });
        self.session.run_write(&write_query, &params).await?;

        tracing::debug!(label, identifier = %identifier, "Deleted entity");
        self.publish(Operation::Delete, Value::Object(snapshot.clone()), &request.publish)
            .await;
        Ok(snapshot)
    }

    /// Execute a caller-supplied edge-creation query and publish the raw
    /// write result.
    pub async fn create_relationship(&self, request: RelationshipRequest) -> Result<Vec<Record>> {
        required(&request.query, "relationship query")?;
        if !request.query.contains("-[") {
            return Err(AdapterError::Validation(
                "relationship query must contain an edge pattern".to_string(),
            ));
        }
        self.run_relationship(request, Operation::Create).await
    }

    /// Execute a caller-supplied edge-deletion query and publish the raw
    /// write result.
    pub async fn delete_relationship(&self, request: RelationshipRequest) -> Result<Vec<Record>> {
        required(&request.query, "relationship query")?;
        if !request.query.contains("-[") || !request.query.to_uppercase().contains("DELETE") {
            return Err(AdapterError::Validation(
                "relationship query must contain an edge deletion clause".to_string(),
            ));
        }
        self.run_relationship(request, Operation::Delete).await
    }

    /// Run a parameterized read and return the raw records.
    pub async fn query(
        &self,
        query: &str,
        placeholder: Option<&PropertyMap>,
    ) -> Result<Vec<Record>> {
        required(query, "query")?;
        if !query.contains('$') {
            return Err(AdapterError::Validation(
                "query requires at least one $-placeholder".to_string(),
            ));
        }
        let params = clean_placeholders(placeholder);
        Ok(self.session.run_read(query, &params).await?)
    }

    async fn run_relationship(
        &self,
        request: RelationshipRequest,
        operation: Operation,
    ) -> Result<Vec<Record>> {
        let params = clean_placeholders(request.placeholder.as_ref());
        let outcome = self.session.run_write(&request.query, &params).await?;

        self.publish(operation, records_to_json(&outcome.records), &request.publish)
            .await;
        Ok(outcome.records)
    }

    fn apply_schema(&self, payload: PropertyMap) -> PropertyMap {
        match &self.schema {
            Some(schema) => schema::project(&payload, schema),
            None => payload,
        }
    }

    fn resolve_field(&self, requested: Option<&str>, configured: &str, what: &str) -> Result<String> {
        let value = requested.unwrap_or(configured);
        if value.trim().is_empty() {
            return Err(AdapterError::Validation(format!("{what} is required")));
        }
        Ok(value.to_string())
    }

    async fn publish(&self, operation: Operation, payload: Value, options: &PublishOptions) {
        let Some(destination) = self.config.destination.as_deref() else {
            return;
        };
        let attributes =
            format_attributes(operation, &self.config.default_attributes, &options.attributes);
        self.publisher
            .publish(destination, &payload, &attributes)
            .await;
    }
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(AdapterError::Validation(format!("{what} is required")));
    }
    Ok(value)
}

fn props_params(payload: &PropertyMap) -> Result<PropertyMap> {
    let text = serde_json::to_string(&Value::Object(payload.clone()))
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    let mut params = PropertyMap::new();
    params.insert("props".to_string(), Value::String(text));
    Ok(params)
}
