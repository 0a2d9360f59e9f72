//! Neo4j connection management and the Bolt-backed session.

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde_json::Value;

use verge_core::PropertyMap;

use crate::session::{GraphSession, WriteOutcome};
use crate::value::{GraphValue, NodeRef, PathRef, Record, RelationshipRef};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
    /// Result column aliases probed when decoding rows. Bolt rows do not
    /// expose their column names, so decoding checks these in order.
    pub result_aliases: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "verge-dev".to_string(),
            max_connections: 16,
            fetch_size: 256,
            result_aliases: default_aliases(),
        }
    }
}

fn default_aliases() -> Vec<String> {
    ["n", "a", "b", "m", "r", "p", "node", "rel", "path"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl GraphConfig {
    /// Load connection settings from `<file_prefix>.toml` and
    /// `VERGE__`-prefixed environment variables, falling back to defaults.
    pub fn load(file_prefix: &str) -> Self {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("VERGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build();

        match cfg {
            Ok(c) => GraphConfig {
                uri: c
                    .get_string("graph.uri")
                    .unwrap_or_else(|_| "bolt://localhost:7687".to_string()),
                user: c
                    .get_string("graph.user")
                    .unwrap_or_else(|_| "neo4j".to_string()),
                password: c
                    .get_string("graph.password")
                    .unwrap_or_else(|_| "verge-dev".to_string()),
                ..Default::default()
            },
            Err(_) => GraphConfig::default(),
        }
    }
}

/// Bolt-backed session with connection pooling.
///
/// This is the production implementation of [`GraphSession`].
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct BoltSession {
    graph: Graph,
    aliases: Vec<String>,
}

impl BoltSession {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self {
            graph,
            aliases: config.result_aliases.clone(),
        })
    }

    fn build_query(&self, query: &str, params: &PropertyMap) -> Query {
        let mut q = neo4rs::query(query);
        for (key, value) in params {
            q = apply_param(q, key, value);
        }
        q
    }
}

#[async_trait]
impl GraphSession for BoltSession {
    async fn run_read(&self, query: &str, params: &PropertyMap) -> Result<Vec<Record>, GraphError> {
        let q = self.build_query(query, params);
        let mut stream = self.graph.execute(q).await?;
        let mut records = Vec::new();
        while let Some(row) = stream.next().await? {
            records.push(row_to_record(&row, &self.aliases));
        }
        Ok(records)
    }

    async fn run_write(
        &self,
        query: &str,
        params: &PropertyMap,
    ) -> Result<WriteOutcome, GraphError> {
        let q = self.build_query(query, params);
        let mut stream = self.graph.execute(q).await?;
        let mut records = Vec::new();
        while let Some(row) = stream.next().await? {
            records.push(row_to_record(&row, &self.aliases));
        }
        let rows_affected = records.len();
        tracing::debug!(rows_affected, "Write executed");
        Ok(WriteOutcome {
            records,
            rows_affected,
        })
    }

    async fn write_atomic(
        &self,
        query: &str,
        params: &PropertyMap,
    ) -> Result<WriteOutcome, GraphError> {
        let mut txn = self.graph.start_txn().await?;
        let q = self.build_query(query, params);

        let mut records = Vec::new();
        let mut stream = txn.execute(q).await?;
        while let Some(row) = stream.next(txn.handle()).await? {
            records.push(row_to_record(&row, &self.aliases));
        }
        txn.commit().await?;

        let rows_affected = records.len();
        tracing::debug!(rows_affected, "Atomic write committed");
        Ok(WriteOutcome {
            records,
            rows_affected,
        })
    }
}

/// Bind one JSON parameter onto a query.
///
/// Native scalars bind directly. Structured values travel as JSON text and
/// are expanded server-side with `apoc.convert.fromJsonMap`, the same way
/// generic property maps are written.
fn apply_param(q: Query, key: &str, value: &Value) -> Query {
    match value {
        Value::String(text) => q.param(key, text.clone()),
        Value::Bool(flag) => q.param(key, *flag),
        Value::Number(number) if number.is_i64() => {
            q.param(key, number.as_i64().unwrap_or_default())
        }
        Value::Number(number) => q.param(key, number.as_f64().unwrap_or_default()),
        Value::Null => q.param(key, String::new()),
        structured => q.param(key, structured.to_string()),
    }
}

/// Decode one row by probing the configured aliases for each known result
/// shape. Alias order stands in for column order.
fn row_to_record(row: &neo4rs::Row, aliases: &[String]) -> Record {
    let mut record = Record::new();
    for alias in aliases {
        if let Ok(node) = row.get::<neo4rs::Node>(alias) {
            record.push(GraphValue::Node(convert_node(&node)));
        } else if let Ok(rel) = row.get::<neo4rs::Relation>(alias) {
            record.push(GraphValue::Relationship(convert_relation(&rel)));
        } else if let Ok(path) = row.get::<neo4rs::Path>(alias) {
            record.push(GraphValue::Path(convert_path(&path)));
        } else if let Ok(nodes) = row.get::<Vec<neo4rs::Node>>(alias) {
            record.push(GraphValue::List(
                nodes
                    .iter()
                    .map(|n| GraphValue::Node(convert_node(n)))
                    .collect(),
            ));
        } else if let Ok(value) = row.get::<Value>(alias) {
            record.push(GraphValue::Scalar(value));
        }
    }
    record
}

fn convert_node(node: &neo4rs::Node) -> NodeRef {
    let mut properties = PropertyMap::new();
    for key in node.keys() {
        if let Ok(value) = node.get::<Value>(key) {
            properties.insert(key.to_string(), value);
        }
    }
    NodeRef::new(
        node.id(),
        node.labels().iter().map(|l| l.to_string()).collect(),
        properties,
    )
}

fn convert_relation(rel: &neo4rs::Relation) -> RelationshipRef {
    let mut properties = PropertyMap::new();
    for key in rel.keys() {
        if let Ok(value) = rel.get::<Value>(key) {
            properties.insert(key.to_string(), value);
        }
    }
    RelationshipRef::new(
        rel.start_node_id(),
        rel.end_node_id(),
        rel.typ().to_string(),
        properties,
    )
}

fn convert_path(path: &neo4rs::Path) -> PathRef {
    PathRef {
        nodes: path.nodes().iter().map(convert_node).collect(),
        relationships: path.rels().iter().map(convert_relation).collect(),
    }
}
