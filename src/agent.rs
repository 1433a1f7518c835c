//! Atomic and structure agents, the leaves of every complex.
//!
//! An atomic agent carries one state token, or the wildcard `_` when the
//! state is left open. A structure agent groups atomic agents under a name;
//! its composition holds at most one atomic agent per name, which is checked
//! when the structure is built.
//!
//! Compatibility is asymmetric: `pattern.compatible(candidate)` asks whether
//! the (possibly under-specified) pattern describes the candidate.

use crate::signature::{SignatureError, Signatures};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// The wildcard state token.
pub const WILDCARD: &str = "_";

/// Errors raised while building agents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("structure `{structure}` contains atomic agent `{atomic}` more than once")]
    DuplicateAtomic { structure: String, atomic: String },
    #[error("agent names must not be empty")]
    EmptyName,
}

/// One side of a context-completion pair.
///
/// Completion of a consumed-only or produced-only agent leaves the absent
/// side as `None`.
pub type ContextPair<T> = (Option<T>, Option<T>);

/// What an agent is entangled with when its context is completed.
#[derive(Debug, Clone, Copy)]
pub enum Counterpart<'a> {
    /// The agent is a reactant rewritten into the given product agent.
    Paired(&'a Agent),
    /// The agent is a reactant with no product counterpart.
    Consumed,
    /// The agent is a product with no reactant counterpart.
    Produced,
}

/// Smallest named entity with a state value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomicAgent {
    name: String,
    state: String,
}

impl AtomicAgent {
    pub fn new(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: state.into(),
        }
    }

    /// An atomic agent with unspecified state.
    pub fn wildcard(name: impl Into<String>) -> Self {
        Self::new(name, WILDCARD)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn state(&self) -> &str {
        &self.state
    }

    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.state == WILDCARD
    }

    /// Equal, or a wildcard pattern with the same name.
    pub fn compatible(&self, candidate: &AtomicAgent) -> bool {
        self == candidate || (self.name == candidate.name && self.is_wildcard())
    }

    /// Substitutes a matched agent into this template.
    ///
    /// A wildcard template keeps the matched state, a concrete one overrides it.
    pub fn replace(&self, matched: &AtomicAgent) -> AtomicAgent {
        if self.is_wildcard() {
            matched.clone()
        } else {
            self.clone()
        }
    }

    pub fn reduce_context(&self) -> AtomicAgent {
        AtomicAgent::wildcard(self.name.clone())
    }

    pub fn extend_signature(&self, signatures: &mut Signatures) {
        signatures.record_atomic(&self.name, &self.state);
    }

    /// Every concrete version of this agent under the signature.
    pub(crate) fn ground_versions(
        &self,
        signatures: &Signatures,
    ) -> Result<Vec<AtomicAgent>, SignatureError> {
        let states = signatures.atomic_states(&self.name)?;
        if !self.is_wildcard() {
            return Ok(vec![self.clone()]);
        }
        Ok(states
            .iter()
            .map(|state| AtomicAgent::new(self.name.clone(), state.clone()))
            .collect())
    }

    /// Completes the context of an entangled atomic pair.
    ///
    /// Two wildcards of the same name are expanded in lockstep: the context
    /// value is carried over the rewrite, never chosen independently.
    pub(crate) fn complete_pair(
        &self,
        other: &AtomicAgent,
        signatures: &Signatures,
    ) -> Result<Vec<(AtomicAgent, AtomicAgent)>, SignatureError> {
        match (self.is_wildcard(), other.is_wildcard()) {
            (true, true) if self.name == other.name => Ok(signatures
                .atomic_states(&self.name)?
                .iter()
                .map(|state| {
                    (
                        AtomicAgent::new(self.name.clone(), state.clone()),
                        AtomicAgent::new(other.name.clone(), state.clone()),
                    )
                })
                .collect()),
            _ => {
                let lefts = self.ground_versions(signatures)?;
                let rights = other.ground_versions(signatures)?;
                let mut pairs = Vec::with_capacity(lefts.len() * rights.len());
                for left in &lefts {
                    for right in &rights {
                        pairs.push((left.clone(), right.clone()));
                    }
                }
                Ok(pairs)
            }
        }
    }
}

impl fmt::Display for AtomicAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.name, self.state)
    }
}

/// Named container of atomic agents, at most one per atomic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureAgent {
    name: String,
    composition: BTreeMap<String, AtomicAgent>,
}

impl StructureAgent {
    /// Builds a structure, rejecting a composition that names an atomic twice.
    pub fn new(
        name: impl Into<String>,
        composition: impl IntoIterator<Item = AtomicAgent>,
    ) -> Result<Self, AgentError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AgentError::EmptyName);
        }
        let mut parts = BTreeMap::new();
        for atomic in composition {
            if atomic.name.is_empty() {
                return Err(AgentError::EmptyName);
            }
            if parts.contains_key(&atomic.name) {
                return Err(AgentError::DuplicateAtomic {
                    structure: name,
                    atomic: atomic.name,
                });
            }
            parts.insert(atomic.name.clone(), atomic);
        }
        Ok(Self {
            name,
            composition: parts,
        })
    }

    /// A structure with empty composition.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            composition: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The atomic agent of the given name, if present.
    pub fn get(&self, atomic: &str) -> Option<&AtomicAgent> {
        self.composition.get(atomic)
    }

    /// Atomic agents in name order.
    pub fn atomics(&self) -> impl Iterator<Item = &AtomicAgent> {
        self.composition.values()
    }

    pub fn len(&self) -> usize {
        self.composition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.composition.is_empty()
    }

    /// Same name, and every pattern atomic has a compatible counterpart.
    ///
    /// One atomic per name makes the counterpart lookup a direct index.
    pub fn compatible(&self, candidate: &StructureAgent) -> bool {
        if self == candidate {
            return true;
        }
        if self.name != candidate.name {
            return false;
        }
        self.composition.values().all(|pattern| {
            candidate
                .composition
                .get(&pattern.name)
                .is_some_and(|found| pattern.compatible(found))
        })
    }

    /// Substitutes a matched structure into this template.
    ///
    /// The matched composition is kept, template atomics override their
    /// namesakes, and concrete template atomics missing from the match are added.
    pub fn replace(&self, matched: &StructureAgent) -> StructureAgent {
        let mut composition = BTreeMap::new();
        for (name, atomic) in &matched.composition {
            let replaced = match self.composition.get(name) {
                Some(template) => template.replace(atomic),
                None => atomic.clone(),
            };
            composition.insert(name.clone(), replaced);
        }
        for (name, template) in &self.composition {
            if !composition.contains_key(name) && !template.is_wildcard() {
                composition.insert(name.clone(), template.clone());
            }
        }
        StructureAgent {
            name: self.name.clone(),
            composition,
        }
    }

    pub fn reduce_context(&self) -> StructureAgent {
        StructureAgent::empty(self.name.clone())
    }

    pub fn extend_signature(&self, signatures: &mut Signatures) {
        signatures.record_structure(&self.name, self.composition.keys().map(String::as_str));
        for atomic in self.composition.values() {
            atomic.extend_signature(signatures);
        }
    }

    /// Atomic names of the signature plus any present ones, in order.
    fn context_names(&self, signatures: &Signatures) -> Result<BTreeSet<String>, SignatureError> {
        let mut names = signatures.structure_components(&self.name)?.clone();
        names.extend(self.composition.keys().cloned());
        Ok(names)
    }

    fn atomic_or_wildcard(&self, name: &str) -> AtomicAgent {
        self.composition
            .get(name)
            .cloned()
            .unwrap_or_else(|| AtomicAgent::wildcard(name))
    }

    /// Every concrete version of this structure under the signature.
    pub(crate) fn ground_versions(
        &self,
        signatures: &Signatures,
    ) -> Result<Vec<StructureAgent>, SignatureError> {
        let mut options = Vec::new();
        for name in self.context_names(signatures)? {
            options.push(self.atomic_or_wildcard(&name).ground_versions(signatures)?);
        }
        Ok(cartesian_product(&options)
            .into_iter()
            .map(|atomics| self.rebuilt(atomics))
            .collect())
    }

    /// Completes the context of a structure rewritten into a namesake.
    fn complete_pair(
        &self,
        other: &StructureAgent,
        signatures: &Signatures,
    ) -> Result<Vec<(StructureAgent, StructureAgent)>, SignatureError> {
        let mut names = self.context_names(signatures)?;
        names.extend(other.context_names(signatures)?);

        let mut options = Vec::with_capacity(names.len());
        for name in &names {
            let left = self.atomic_or_wildcard(name);
            let right = other.atomic_or_wildcard(name);
            options.push(left.complete_pair(&right, signatures)?);
        }
        Ok(cartesian_product(&options)
            .into_iter()
            .map(|choice| {
                let (lefts, rights): (Vec<_>, Vec<_>) = choice.into_iter().unzip();
                (self.rebuilt(lefts), other.rebuilt(rights))
            })
            .collect())
    }

    fn rebuilt(&self, atomics: Vec<AtomicAgent>) -> StructureAgent {
        StructureAgent {
            name: self.name.clone(),
            composition: atomics
                .into_iter()
                .map(|atomic| (atomic.name.clone(), atomic))
                .collect(),
        }
    }
}

impl fmt::Display for StructureAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, atomic) in self.composition.values().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", atomic)?;
        }
        write!(f, ")")
    }
}

/// Either kind of agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Agent {
    Atomic(AtomicAgent),
    Structure(StructureAgent),
}

impl Agent {
    pub fn name(&self) -> &str {
        match self {
            Agent::Atomic(atomic) => atomic.name(),
            Agent::Structure(structure) => structure.name(),
        }
    }

    /// Kinds must agree; then the kind-specific rule applies.
    pub fn compatible(&self, candidate: &Agent) -> bool {
        match (self, candidate) {
            (Agent::Atomic(p), Agent::Atomic(c)) => p.compatible(c),
            (Agent::Structure(p), Agent::Structure(c)) => p.compatible(c),
            _ => false,
        }
    }

    /// Substitutes a matched agent into this template; a kind mismatch keeps the template.
    pub fn replace(&self, matched: &Agent) -> Agent {
        match (self, matched) {
            (Agent::Atomic(t), Agent::Atomic(m)) => Agent::Atomic(t.replace(m)),
            (Agent::Structure(t), Agent::Structure(m)) => Agent::Structure(t.replace(m)),
            _ => self.clone(),
        }
    }

    pub fn reduce_context(&self) -> Agent {
        match self {
            Agent::Atomic(atomic) => Agent::Atomic(atomic.reduce_context()),
            Agent::Structure(structure) => Agent::Structure(structure.reduce_context()),
        }
    }

    pub fn extend_signature(&self, signatures: &mut Signatures) {
        match self {
            Agent::Atomic(atomic) => atomic.extend_signature(signatures),
            Agent::Structure(structure) => structure.extend_signature(signatures),
        }
    }

    /// Whether any wildcard state occurs in this agent.
    pub fn has_wildcard(&self) -> bool {
        match self {
            Agent::Atomic(atomic) => atomic.is_wildcard(),
            Agent::Structure(structure) => structure.atomics().any(AtomicAgent::is_wildcard),
        }
    }

    /// Collects the names of all atomic agents occurring in this agent.
    pub fn collect_atomic_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Agent::Atomic(atomic) => {
                names.insert(atomic.name().to_string());
            }
            Agent::Structure(structure) => {
                names.extend(structure.atomics().map(|a| a.name().to_string()));
            }
        }
    }

    /// Every concrete version of this agent under the signature.
    pub fn ground_versions(&self, signatures: &Signatures) -> Result<Vec<Agent>, SignatureError> {
        Ok(match self {
            Agent::Atomic(atomic) => atomic
                .ground_versions(signatures)?
                .into_iter()
                .map(Agent::Atomic)
                .collect(),
            Agent::Structure(structure) => structure
                .ground_versions(signatures)?
                .into_iter()
                .map(Agent::Structure)
                .collect(),
        })
    }

    /// Context completion of one entry of a rule's pair list.
    ///
    /// Returns every concrete `(reactant, product)` pair consistent with the
    /// signatures. For a consumed or produced agent the absent side is `None`.
    pub fn add_context(
        &self,
        counterpart: Counterpart<'_>,
        signatures: &Signatures,
    ) -> Result<Vec<ContextPair<Agent>>, SignatureError> {
        match counterpart {
            Counterpart::Consumed => Ok(self
                .ground_versions(signatures)?
                .into_iter()
                .map(|agent| (Some(agent), None))
                .collect()),
            Counterpart::Produced => Ok(self
                .ground_versions(signatures)?
                .into_iter()
                .map(|agent| (None, Some(agent)))
                .collect()),
            Counterpart::Paired(other) => match (self, other) {
                (Agent::Atomic(left), Agent::Atomic(right)) => Ok(left
                    .complete_pair(right, signatures)?
                    .into_iter()
                    .map(|(l, r)| (Some(Agent::Atomic(l)), Some(Agent::Atomic(r))))
                    .collect()),
                (Agent::Structure(left), Agent::Structure(right)) if left.name == right.name => {
                    Ok(left
                        .complete_pair(right, signatures)?
                        .into_iter()
                        .map(|(l, r)| (Some(Agent::Structure(l)), Some(Agent::Structure(r))))
                        .collect())
                }
                _ => {
                    let lefts = self.ground_versions(signatures)?;
                    let rights = other.ground_versions(signatures)?;
                    let mut pairs = Vec::with_capacity(lefts.len() * rights.len());
                    for left in &lefts {
                        for right in &rights {
                            pairs.push((Some(left.clone()), Some(right.clone())));
                        }
                    }
                    Ok(pairs)
                }
            },
        }
    }
}

impl From<AtomicAgent> for Agent {
    fn from(atomic: AtomicAgent) -> Self {
        Agent::Atomic(atomic)
    }
}

impl From<StructureAgent> for Agent {
    fn from(structure: StructureAgent) -> Self {
        Agent::Structure(structure)
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agent::Atomic(atomic) => atomic.fmt(f),
            Agent::Structure(structure) => structure.fmt(f),
        }
    }
}

/// Cartesian product of option lists, in lexicographic order of choices.
///
/// An empty list of options yields a single empty choice.
pub(crate) fn cartesian_product<T: Clone>(options: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut product: Vec<Vec<T>> = vec![Vec::with_capacity(options.len())];
    for choices in options {
        let mut next = Vec::with_capacity(product.len() * choices.len());
        for prefix in &product {
            for choice in choices {
                let mut extended = prefix.clone();
                extended.push(choice.clone());
                next.push(extended);
            }
        }
        product = next;
    }
    product
}
