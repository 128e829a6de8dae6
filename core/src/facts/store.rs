//! Read-only snapshot of what remote units have published on each relation.
//!
//! The store is built once at the start of a hook invocation and never
//! mutated afterwards. Unit order within a relation id is preserved exactly as
//! the host reported it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::infrastructure::HostBackend;
use crate::types::relation::{fact_text, RelationData};

/// Facts one remote unit published on one relation id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitFacts {
    pub unit: String,
    #[serde(default)]
    pub data: RelationData,
}

/// One established relation id and the units on its far side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationInstance {
    pub id: String,
    #[serde(default)]
    pub units: Vec<UnitFacts>,
}

/// A complete set of facts from one unit, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FactSet {
    pub relation_id: String,
    pub unit: String,
    pub data: RelationData,
}

impl FactSet {
    pub fn text(&self, key: &str) -> Option<String> {
        self.data.get(key).and_then(fact_text)
    }
}

/// Why a relation cannot contribute yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompleteness {
    /// No relation id of that name exists.
    NotJoined,
    /// Joined, but no remote unit is present.
    NoUnits,
    /// Units exist, but none has published all required keys. Lists the
    /// keys missing on the closest unit.
    MissingKeys(Vec<String>),
}

/// Result of asking the store for a relation's facts.
#[derive(Debug, Clone, PartialEq)]
pub enum FactLookup {
    /// Every listed unit carries all required keys, non-empty.
    Complete(Vec<FactSet>),
    Incomplete {
        relation: String,
        reason: Incompleteness,
    },
}

impl FactLookup {
    pub fn is_complete(&self) -> bool {
        matches!(self, FactLookup::Complete(_))
    }

    /// The complete fact sets, or `None` when incomplete.
    pub fn complete(self) -> Option<Vec<FactSet>> {
        match self {
            FactLookup::Complete(sets) => Some(sets),
            FactLookup::Incomplete { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FactStore {
    #[serde(default)]
    local_unit: String,
    #[serde(default)]
    relations: BTreeMap<String, Vec<RelationInstance>>,
}

impl FactStore {
    pub fn new(local_unit: &str) -> Self {
        FactStore {
            local_unit: local_unit.to_string(),
            relations: BTreeMap::new(),
        }
    }

    /// Add a relation id with its units. Used while gathering and by tests.
    pub fn with_relation(mut self, relation: &str, id: &str, units: Vec<UnitFacts>) -> Self {
        self.relations
            .entry(relation.to_string())
            .or_default()
            .push(RelationInstance {
                id: id.to_string(),
                units,
            });
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AgentError::Facts(format!("parse error: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| AgentError::file_access(path, e))?;
        Self::from_json(&content)
    }

    /// Query the host for every relation in `relations`.
    pub fn gather(host: &dyn HostBackend, relations: &[&str]) -> Result<Self> {
        let local_unit = host
            .local_unit()
            .map_err(|e| AgentError::Facts(format!("local unit: {}", e)))?;
        let mut store = FactStore::new(&local_unit);
        for relation in relations {
            let ids = host
                .relation_ids(relation)
                .map_err(|e| AgentError::Facts(format!("relation-ids {}: {}", relation, e)))?;
            for id in ids {
                let mut units = Vec::new();
                let names = host
                    .related_units(&id)
                    .map_err(|e| AgentError::Facts(format!("relation-list {}: {}", id, e)))?;
                for unit in names {
                    let data = host
                        .relation_get(&id, &unit)
                        .map_err(|e| AgentError::Facts(format!("relation-get {} {}: {}", id, unit, e)))?;
                    units.push(UnitFacts { unit, data });
                }
                store = store.with_relation(relation, &id, units);
            }
        }
        Ok(store)
    }

    pub fn local_unit(&self) -> &str {
        &self.local_unit
    }

    /// Relation ids established for `relation`, in host order.
    pub fn relation_ids(&self, relation: &str) -> Vec<String> {
        self.relations
            .get(relation)
            .map(|ids| ids.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Remote units on the given relation id.
    pub fn related_units(&self, relation_id: &str) -> Vec<String> {
        self.instance(relation_id)
            .map(|inst| inst.units.iter().map(|u| u.unit.clone()).collect())
            .unwrap_or_default()
    }

    /// A single fact, as text. Empty strings read as absent.
    pub fn get(&self, relation_id: &str, unit: &str, key: &str) -> Option<String> {
        self.instance(relation_id)?
            .units
            .iter()
            .find(|u| u.unit == unit)?
            .data
            .get(key)
            .and_then(fact_text)
    }

    /// Every unit on every id of `relation` that carries all `required` keys.
    pub fn facts_for(&self, relation: &str, required: &[&str]) -> FactLookup {
        let incomplete = |reason| FactLookup::Incomplete {
            relation: relation.to_string(),
            reason,
        };
        let instances = match self.relations.get(relation) {
            Some(ids) if !ids.is_empty() => ids,
            _ => return incomplete(Incompleteness::NotJoined),
        };

        let mut complete = Vec::new();
        let mut fewest_missing: Option<Vec<String>> = None;
        let mut saw_unit = false;
        for inst in instances {
            for unit in &inst.units {
                saw_unit = true;
                let missing: Vec<String> = required
                    .iter()
                    .filter(|k| unit.data.get(**k).and_then(fact_text).is_none())
                    .map(|k| k.to_string())
                    .collect();
                if missing.is_empty() {
                    complete.push(FactSet {
                        relation_id: inst.id.clone(),
                        unit: unit.unit.clone(),
                        data: unit.data.clone(),
                    });
                } else if fewest_missing
                    .as_ref()
                    .map_or(true, |prev| missing.len() < prev.len())
                {
                    fewest_missing = Some(missing);
                }
            }
        }

        if !saw_unit {
            return incomplete(Incompleteness::NoUnits);
        }
        if complete.is_empty() {
            return incomplete(Incompleteness::MissingKeys(fewest_missing.unwrap_or_default()));
        }
        FactLookup::Complete(complete)
    }

    pub fn is_complete(&self, relation: &str, required: &[&str]) -> bool {
        self.facts_for(relation, required).is_complete()
    }

    /// Whether any unit on `relation` has published all of `keys`.
    pub fn is_relation_made(&self, relation: &str, keys: &[&str]) -> bool {
        self.is_complete(relation, keys)
    }

    /// Whether the hacluster subordinate reports the service as clustered.
    pub fn is_clustered(&self) -> bool {
        self.relations
            .get("ha")
            .into_iter()
            .flatten()
            .flat_map(|inst| inst.units.iter())
            .any(|u| u.data.get("clustered").map_or(false, is_truthy))
    }

    /// Number of peers on the `cluster` relation.
    pub fn peer_count(&self) -> usize {
        self.relations
            .get("cluster")
            .into_iter()
            .flatten()
            .map(|inst| inst.units.len())
            .sum()
    }

    fn instance(&self, relation_id: &str) -> Option<&RelationInstance> {
        self.relations
            .values()
            .flatten()
            .find(|inst| inst.id == relation_id)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty() && s != "None",
        _ => true,
    }
}

/// Shorthand for building unit facts in tests and fixtures.
pub fn unit(name: &str, pairs: &[(&str, &str)]) -> UnitFacts {
    UnitFacts {
        unit: name.to_string(),
        data: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect(),
    }
}
