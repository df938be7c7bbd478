//! Cypher storage backend.
//!
//! Renders each store primitive as one parameterized Cypher statement and
//! hands it to a caller-supplied [`CypherExecutor`], typically a thin wrapper
//! around a driver session. Labels, relationship types, and property names
//! are checked identifiers placed in the text; every value travels as a
//! parameter.
//!
//! ## Limitations
//!
//! - Write-only: lookups and counts fall back to the trait defaults.
//! - Executors report no ids, so returned `NodeId`/`EdgeId` values are
//!   per-backend statement sequence numbers, not store ids.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::entity::{non_key, Encoding, EntityType, Field, KEY_FIELD};
use crate::index::{IndexSpec, IndexType};
use crate::model::*;
use crate::relationship::{is_identifier, EdgeKey};
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::{ConstraintSpec, StorageBackend};

// ============================================================================
// Statement + executor
// ============================================================================

/// One Cypher statement with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Transaction the statement belongs to; `None` for schema statements,
    /// which run in their own implicit transaction.
    pub tx: Option<TxId>,
    pub text: String,
    pub params: PropertyMap,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self { tx: None, text: text.into(), params: PropertyMap::new() }
    }

    pub fn in_tx(mut self, tx: TxId) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// The session a `CypherBackend` writes through.
///
/// Errors should be `Error::StoreUnavailable` for connectivity, auth, and
/// timeout failures, and `Error::Storage` or `Error::ConstraintViolation`
/// for anything the store itself rejected.
#[async_trait]
pub trait CypherExecutor: Send + Sync + 'static {
    async fn run(&self, stmt: Statement) -> Result<()>;

    async fn begin(&self, _tx: TxId) -> Result<()> { Ok(()) }

    async fn commit(&self, _tx: TxId) -> Result<()> { Ok(()) }

    async fn rollback(&self, _tx: TxId) -> Result<()> { Ok(()) }
}

// ============================================================================
// CypherBackend
// ============================================================================

pub struct CypherBackend<E> {
    executor: E,
    next_tx_id: AtomicU64,
    next_seq: AtomicU64,
}

impl<E: CypherExecutor> CypherBackend<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            next_tx_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(1),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct CypherTx {
    id: TxId,
    mode: TxMode,
}

impl Transaction for CypherTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

// ============================================================================
// Rendering
// ============================================================================

fn checked(name: &str, what: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid {what} '{name}'")))
    }
}

/// Parameter value for a field, in the form the wrapping function expects.
fn encode(value: &Value, encoding: Encoding) -> Value {
    match (value, encoding) {
        (Value::Date(d), Encoding::Date) => Value::String(d.format("%Y-%m-%d").to_string()),
        (Value::DateTime(dt), Encoding::Timestamp) => Value::String(dt.to_rfc3339()),
        (other, _) => other.clone(),
    }
}

fn set_expr(var: &str, name: &str, encoding: Encoding) -> String {
    match encoding {
        Encoding::Date => format!("{var}.{name} = date($p_{name})"),
        Encoding::Timestamp => format!("{var}.{name} = datetime($p_{name})"),
        Encoding::Scalar | Encoding::List => format!("{var}.{name} = $p_{name}"),
    }
}

/// `MERGE (n:Label {id: $key}) SET n.f = $p_f, ...`
pub fn node_statement(label: EntityType, key: &str, fields: &[Field]) -> Result<Statement> {
    let mut stmt = Statement::new(format!("MERGE (n:{label} {{{KEY_FIELD}: $key}})")).param("key", key);
    let mut sets = Vec::new();
    for field in non_key(fields) {
        checked(field.name, "property name")?;
        sets.push(set_expr("n", field.name, field.encoding));
        stmt.params.insert(format!("p_{}", field.name), encode(&field.value, field.encoding));
    }
    if !sets.is_empty() {
        let _ = write!(stmt.text, "\nSET {}", sets.join(", "));
    }
    Ok(stmt)
}

/// Both endpoint merges plus the edge merge, in one statement.
pub fn edge_statement(key: &EdgeKey, props: &PropertyMap) -> Result<Statement> {
    checked(&key.rel_type, "relationship type")?;
    let mut stmt = Statement::new(format!(
        "MERGE (a:{} {{{KEY_FIELD}: $from_id}})\nMERGE (b:{} {{{KEY_FIELD}: $to_id}})\nMERGE (a)-[r:{}]->(b)",
        key.from_label, key.to_label, key.rel_type
    ))
    .param("from_id", key.from_id.as_str())
    .param("to_id", key.to_id.as_str());

    let mut sets = Vec::new();
    for (name, value) in props {
        checked(name, "property name")?;
        sets.push(set_expr("r", name, Encoding::Scalar));
        stmt.params.insert(format!("p_{name}"), value.clone());
    }
    if !sets.is_empty() {
        let _ = write!(stmt.text, "\nSET {}", sets.join(", "));
    }
    Ok(stmt)
}

pub fn constraint_statement(spec: &ConstraintSpec) -> Result<Statement> {
    checked(&spec.property, "property name")?;
    Ok(Statement::new(format!(
        "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
        spec.name(),
        spec.label,
        spec.property
    )))
}

pub fn index_statement(spec: &IndexSpec) -> Result<Statement> {
    checked(&spec.name, "index name")?;
    for p in &spec.properties {
        checked(p, "property name")?;
    }
    if spec.properties.is_empty() {
        return Err(Error::Validation(format!("index {} has no properties", spec.name)));
    }
    let props: Vec<String> = spec.properties.iter().map(|p| format!("n.{p}")).collect();
    let text = match spec.index_type {
        IndexType::BTree => format!(
            "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON ({})",
            spec.name,
            spec.label,
            props.join(", ")
        ),
        IndexType::FullText => format!(
            "CREATE FULLTEXT INDEX {} IF NOT EXISTS FOR (n:{}) ON EACH [{}]",
            spec.name,
            spec.label,
            props.join(", ")
        ),
    };
    Ok(Statement::new(text))
}

/// Whether a schema error only says the object is already there.
fn is_already_exists(err: &Error) -> bool {
    if matches!(err, Error::StoreUnavailable(_)) {
        return false;
    }
    let msg = err.to_string().to_lowercase();
    msg.contains("already exists") || msg.contains("equivalent")
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl<E: CypherExecutor> StorageBackend for CypherBackend<E> {
    type Tx = CypherTx;

    async fn shutdown(&self) -> Result<()> { Ok(()) }

    async fn begin_tx(&self, mode: TxMode) -> Result<CypherTx> {
        let id = TxId(self.next_tx_id.fetch_add(1, Ordering::Relaxed));
        self.executor.begin(id).await?;
        tracing::trace!(tx = %id, ?mode, "began transaction");
        Ok(CypherTx { id, mode })
    }

    async fn commit_tx(&self, tx: CypherTx) -> Result<()> {
        self.executor.commit(tx.id).await
    }

    async fn rollback_tx(&self, tx: CypherTx) -> Result<()> {
        tracing::debug!(tx = %tx.id, "rolling back");
        self.executor.rollback(tx.id).await
    }

    async fn merge_node(
        &self,
        tx: &mut CypherTx,
        label: EntityType,
        key: &str,
        fields: &[Field],
    ) -> Result<NodeId> {
        tx.ensure_writable()?;
        let stmt = node_statement(label, key, fields)?.in_tx(tx.id);
        self.executor.run(stmt).await?;
        Ok(NodeId(self.seq()))
    }

    async fn merge_edge(
        &self,
        tx: &mut CypherTx,
        key: &EdgeKey,
        props: &PropertyMap,
    ) -> Result<EdgeId> {
        tx.ensure_writable()?;
        let stmt = edge_statement(key, props)?.in_tx(tx.id);
        self.executor.run(stmt).await?;
        Ok(EdgeId(self.seq()))
    }

    async fn create_constraint(&self, constraint: &ConstraintSpec) -> Result<()> {
        match self.executor.run(constraint_statement(constraint)?).await {
            Err(e) if is_already_exists(&e) => Err(Error::ConstraintAlreadyExists {
                label: constraint.label.label().to_string(),
                property: constraint.property.clone(),
            }),
            other => other,
        }
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<()> {
        match self.executor.run(index_statement(index)?).await {
            Err(e) if is_already_exists(&e) => {
                Err(Error::IndexAlreadyExists { name: index.name.clone() })
            }
            other => other,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
