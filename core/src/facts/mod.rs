//! Relationship fact store: the read side of every relation.
//!
//! Builders ask `FactStore::facts_for` for a relation and get back either the
//! complete fact sets or an `Incomplete` marker. Nothing here writes to a
//! relation; publishing goes through `HostAction::RelationSet`.

pub mod store;

pub use store::{unit, FactLookup, FactSet, FactStore, Incompleteness, RelationInstance, UnitFacts};
