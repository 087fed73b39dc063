//! Deferred memory graph mutations.
//!
//! A [`QueueEntry`] is one durable line of the graph queue. At flush time
//! every entry is folded into an [`AggregatedOperationSet`]:
//!
//! - entities: last write wins (by timestamp, file order on ties)
//! - relations: set union
//! - observations: per-entity set union
//!
//! Folding is commutative for relations and observations, so the relative
//! order in which separate invocations appended their lines does not matter.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HookError;

/// Kind of graph mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphOp {
    /// Create or replace an entity
    CreateEntity,
    /// Link two entities
    CreateRelation,
    /// Attach observations to an entity
    AddObservation,
}

impl GraphOp {
    /// Parse the wire name (`create_entity`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "create_entity" => Some(GraphOp::CreateEntity),
            "create_relation" => Some(GraphOp::CreateRelation),
            "add_observation" => Some(GraphOp::AddObservation),
            _ => None,
        }
    }
}

/// A graph entity as consumed by the downstream memory tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique entity name
    pub name: String,
    /// Entity type (agent, file, session, decision, ...)
    pub entity_type: String,
    /// Observations supplied at creation
    #[serde(default)]
    pub observations: Vec<String>,
}

/// A directed, typed edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Source entity name
    pub from: String,
    /// Target entity name
    pub to: String,
    /// Relation type (spawned, modified, ...)
    pub relation_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationPayload {
    entity_name: String,
    contents: Vec<String>,
}

/// A validated mutation extracted from a queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphMutation {
    /// Entity creation
    Entity(Entity),
    /// Relation creation
    Relation(Relation),
    /// Observations for an entity
    Observation {
        /// Target entity
        entity_name: String,
        /// Observation texts
        contents: Vec<String>,
    },
}

/// One durable line of the graph queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Mutation kind
    pub op: GraphOp,
    /// Op-specific payload
    pub payload: Map<String, Value>,
    /// When the entry was enqueued
    pub timestamp: DateTime<Utc>,
}

impl QueueEntry {
    /// Build an entry from a raw payload. The payload must be a JSON object
    /// with the fields required by `op`.
    pub fn new(op: GraphOp, payload: Value) -> Result<Self, HookError> {
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                return Err(HookError::InvalidPayload(format!(
                    "payload must be an object, got {other}"
                )))
            }
        };
        let entry = Self {
            op,
            payload,
            timestamp: Utc::now(),
        };
        entry.mutation()?;
        Ok(entry)
    }

    /// Entity creation entry.
    pub fn create_entity(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        observations: Vec<String>,
    ) -> Self {
        let entity = Entity {
            name: name.into(),
            entity_type: entity_type.into(),
            observations,
        };
        Self::from_serializable(GraphOp::CreateEntity, &entity)
    }

    /// Relation creation entry.
    pub fn create_relation(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        let relation = Relation {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        };
        Self::from_serializable(GraphOp::CreateRelation, &relation)
    }

    /// Observation entry.
    pub fn add_observation(entity_name: impl Into<String>, contents: Vec<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("entityName".to_string(), Value::String(entity_name.into()));
        payload.insert(
            "contents".to_string(),
            Value::Array(contents.into_iter().map(Value::String).collect()),
        );
        Self {
            op: GraphOp::AddObservation,
            payload,
            timestamp: Utc::now(),
        }
    }

    fn from_serializable<T: Serialize>(op: GraphOp, value: &T) -> Self {
        let payload = match serde_json::to_value(value) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            op,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Serialize as one queue line (no trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse and validate one queue line.
    pub fn from_line(line: &str) -> Result<Self, HookError> {
        let entry: QueueEntry = serde_json::from_str(line)?;
        entry.mutation()?;
        Ok(entry)
    }

    /// Validate the payload against the op and extract the mutation.
    pub fn mutation(&self) -> Result<GraphMutation, HookError> {
        let value = Value::Object(self.payload.clone());
        match self.op {
            GraphOp::CreateEntity => {
                let entity: Entity = serde_json::from_value(value)?;
                if entity.name.trim().is_empty() {
                    return Err(HookError::InvalidPayload("entity name is empty".into()));
                }
                Ok(GraphMutation::Entity(entity))
            }
            GraphOp::CreateRelation => {
                let relation: Relation = serde_json::from_value(value)?;
                if relation.from.is_empty() || relation.to.is_empty() {
                    return Err(HookError::InvalidPayload("relation endpoint is empty".into()));
                }
                Ok(GraphMutation::Relation(relation))
            }
            GraphOp::AddObservation => {
                let obs: ObservationPayload = serde_json::from_value(value)?;
                if obs.entity_name.trim().is_empty() {
                    return Err(HookError::InvalidPayload(
                        "observation entity name is empty".into(),
                    ));
                }
                Ok(GraphMutation::Observation {
                    entity_name: obs.entity_name,
                    contents: obs.contents,
                })
            }
        }
    }
}

/// Deduplicated view of all pending queue entries. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedOperationSet {
    /// Entities by name, last write wins
    pub entities: BTreeMap<String, Entity>,
    /// Unique relations
    pub relations: BTreeSet<Relation>,
    /// Unique observations per entity
    pub observations: BTreeMap<String, BTreeSet<String>>,
    #[serde(skip)]
    entity_stamps: BTreeMap<String, DateTime<Utc>>,
}

impl AggregatedOperationSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one entry in. Entries must be applied in file order so that
    /// equal timestamps resolve to the later line.
    pub fn apply(&mut self, entry: &QueueEntry) -> Result<(), HookError> {
        match entry.mutation()? {
            GraphMutation::Entity(entity) => {
                let newer = self
                    .entity_stamps
                    .get(&entity.name)
                    .map_or(true, |seen| entry.timestamp >= *seen);
                if newer {
                    self.entity_stamps
                        .insert(entity.name.clone(), entry.timestamp);
                    self.entities.insert(entity.name.clone(), entity);
                }
            }
            GraphMutation::Relation(relation) => {
                self.relations.insert(relation);
            }
            GraphMutation::Observation {
                entity_name,
                contents,
            } => {
                let set = self.observations.entry(entity_name).or_default();
                set.extend(contents.into_iter().filter(|c| !c.trim().is_empty()));
            }
        }
        Ok(())
    }

    /// Build a set from entries in order.
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a QueueEntry>,
    ) -> Result<Self, HookError> {
        let mut set = Self::new();
        for entry in entries {
            set.apply(entry)?;
        }
        Ok(set)
    }

    /// Whether there is nothing to emit.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.relations.is_empty()
            && self.observations.values().all(BTreeSet::is_empty)
    }

    /// Total number of distinct operations.
    pub fn operation_count(&self) -> usize {
        self.entities.len()
            + self.relations.len()
            + self.observations.values().map(BTreeSet::len).sum::<usize>()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} entities, {} relations, {} observations",
            self.entities.len(),
            self.relations.len(),
            self.observations.values().map(BTreeSet::len).sum::<usize>()
        )
    }
}
