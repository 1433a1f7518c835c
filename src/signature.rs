//! Derived signatures: the domain of legal states and components per agent name.
//!
//! Signatures are never authored. They are collected by scanning every agent
//! of a model (rules and initial state) and then finalized, which adds the
//! wildcard `_` as the only state of any atomic name no agent constrains.

use crate::agent::{Agent, WILDCARD};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Lookup failure in a signature.
///
/// Signatures are derived from the same agents that are later completed
/// against them, so a miss is an internal inconsistency, never user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("atomic agent `{0}` is missing from the atomic signature")]
    UnknownAtomic(String),
    #[error("structure agent `{0}` is missing from the structure signature")]
    UnknownStructure(String),
}

/// Atomic and structure signatures of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatures {
    /// Atomic name -> set of states seen for it.
    atomic: BTreeMap<String, BTreeSet<String>>,
    /// Structure name -> set of atomic names seen inside it.
    structure: BTreeMap<String, BTreeSet<String>>,
}

impl Signatures {
    /// Derives finalized signatures from a collection of agents.
    pub fn from_agents<'a>(agents: impl IntoIterator<Item = &'a Agent>) -> Self {
        let mut signatures = Self::default();
        for agent in agents {
            agent.extend_signature(&mut signatures);
        }
        signatures.finalize();
        signatures
    }

    pub(crate) fn record_atomic(&mut self, name: &str, state: &str) {
        let states = self.atomic.entry(name.to_string()).or_default();
        if state != WILDCARD {
            states.insert(state.to_string());
        }
    }

    pub(crate) fn record_structure<'a>(
        &mut self,
        name: &str,
        components: impl IntoIterator<Item = &'a str>,
    ) {
        let entry = self.structure.entry(name.to_string()).or_default();
        entry.extend(components.into_iter().map(str::to_string));
    }

    /// Adds the wildcard fallback to atomic names no agent constrains.
    pub(crate) fn finalize(&mut self) {
        for states in self.atomic.values_mut() {
            if states.is_empty() {
                states.insert(WILDCARD.to_string());
            }
        }
    }

    /// States an atomic agent of the given name may take.
    pub fn atomic_states(&self, name: &str) -> Result<&BTreeSet<String>, SignatureError> {
        self.atomic
            .get(name)
            .ok_or_else(|| SignatureError::UnknownAtomic(name.to_string()))
    }

    /// Atomic names a structure agent of the given name may contain.
    pub fn structure_components(&self, name: &str) -> Result<&BTreeSet<String>, SignatureError> {
        self.structure
            .get(name)
            .ok_or_else(|| SignatureError::UnknownStructure(name.to_string()))
    }

    /// Iterates the atomic signature in name order.
    pub fn atomics(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.atomic.iter().map(|(name, states)| (name.as_str(), states))
    }

    /// Iterates the structure signature in name order.
    pub fn structures(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.structure.iter().map(|(name, parts)| (name.as_str(), parts))
    }
}
