//! Complexes: multisets of agents living in one compartment.
//!
//! A complex stores its agents in canonical (sorted) order, so the derived
//! `Eq`, `Hash` and `Ord` are invariant under permutation of the agents it
//! was built from. Compatibility with a pattern complex is decided by
//! searching for an alignment of pattern positions onto concrete agents.
//!
//! The textual form is `A{i}.B(x{a},y{b})::cell`; it is what the persisted
//! transition system stores in its `ordering` and can be parsed back.

use crate::agent::{cartesian_product, Agent, AtomicAgent, StructureAgent};
use crate::signature::{SignatureError, Signatures};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Malformed textual complex or side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("complex `{0}` has no `::compartment` suffix")]
    MissingCompartment(String),
    #[error("malformed agent `{0}`")]
    MalformedAgent(String),
    #[error("malformed stoichiometry in `{0}`")]
    MalformedCount(String),
    #[error(transparent)]
    Agent(#[from] crate::agent::AgentError),
}

/// Multiset of agents plus a compartment label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Complex {
    agents: Vec<Agent>,
    compartment: String,
}

impl Complex {
    /// Builds a complex; agent order is irrelevant.
    pub fn new(agents: impl IntoIterator<Item = Agent>, compartment: impl Into<String>) -> Self {
        let mut agents: Vec<Agent> = agents.into_iter().collect();
        agents.sort();
        Self {
            agents,
            compartment: compartment.into(),
        }
    }

    /// Agents in canonical order.
    #[inline]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[inline]
    pub fn compartment(&self) -> &str {
        &self.compartment
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// True when no agent carries a wildcard state.
    pub fn is_ground(&self) -> bool {
        !self.agents.iter().any(Agent::has_wildcard)
    }

    /// Whether this pattern describes the candidate complex.
    ///
    /// Short-circuits on compartment, size and plain equality before the
    /// alignment search.
    pub fn compatible(&self, candidate: &Complex) -> bool {
        if self.compartment != candidate.compartment || self.len() != candidate.len() {
            return false;
        }
        if self == candidate {
            return true;
        }
        let mut found = BTreeSet::new();
        search_alignments(&self.agents, 0, counts(&candidate.agents), &mut Vec::new(), &mut found, true);
        !found.is_empty()
    }

    /// All ways to align an ordered pattern onto this complex's agents.
    ///
    /// Each result lists, per pattern position, the concrete agent assigned
    /// to it. Every agent of the complex is used exactly once, so the pattern
    /// must have the same size as the complex. Results are deduplicated; agents
    /// with equal value are interchangeable.
    pub fn align_agents(&self, pattern: &[Agent]) -> Vec<Vec<Agent>> {
        if pattern.len() != self.len() {
            return Vec::new();
        }
        let mut found = BTreeSet::new();
        search_alignments(pattern, 0, counts(&self.agents), &mut Vec::new(), &mut found, false);
        found.into_iter().collect()
    }

    /// Every fully specified complex this pattern denotes.
    pub fn create_all_compatible(&self, signatures: &Signatures) -> Result<Vec<Complex>, SignatureError> {
        let mut options = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            options.push(agent.ground_versions(signatures)?);
        }
        let unique: BTreeSet<Complex> = cartesian_product(&options)
            .into_iter()
            .map(|agents| Complex::new(agents, self.compartment.clone()))
            .collect();
        Ok(unique.into_iter().collect())
    }

    /// Names of all atomic agents occurring in the complex.
    pub fn get_atomic_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for agent in &self.agents {
            agent.collect_atomic_names(&mut names);
        }
        names
    }

    /// The complex with every agent stripped of its context.
    pub fn reduce_context(&self) -> Complex {
        Complex::new(self.agents.iter().map(Agent::reduce_context), self.compartment.clone())
    }

    pub fn extend_signature(&self, signatures: &mut Signatures) {
        for agent in &self.agents {
            agent.extend_signature(signatures);
        }
    }

    /// Positions in `ordering` of complexes this pattern is compatible with.
    pub fn identify_compatible(&self, ordering: &[Complex]) -> Vec<usize> {
        ordering
            .iter()
            .enumerate()
            .filter(|(_, candidate)| self.compatible(candidate))
            .map(|(i, _)| i)
            .collect()
    }
}

fn counts(agents: &[Agent]) -> BTreeMap<&Agent, u32> {
    let mut counts = BTreeMap::new();
    for agent in agents {
        *counts.entry(agent).or_insert(0) += 1;
    }
    counts
}

/// Backtracking over pattern positions.
///
/// Every branch owns its snapshot of the remaining agent counts, so no
/// branch observes another's depletion. Returns `true` once a result is
/// recorded and `first_only` is set.
fn search_alignments(
    pattern: &[Agent],
    position: usize,
    remaining: BTreeMap<&Agent, u32>,
    current: &mut Vec<Agent>,
    found: &mut BTreeSet<Vec<Agent>>,
    first_only: bool,
) -> bool {
    if position == pattern.len() {
        found.insert(current.clone());
        return first_only;
    }
    for (&agent, &count) in &remaining {
        if count == 0 || !pattern[position].compatible(agent) {
            continue;
        }
        let mut next = remaining.clone();
        if let Some(slot) = next.get_mut(agent) {
            *slot -= 1;
        }
        current.push(agent.clone());
        let done = search_alignments(pattern, position + 1, next, current, found, first_only);
        current.pop();
        if done {
            return true;
        }
    }
    false
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, agent) in self.agents.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", agent)?;
        }
        write!(f, "::{}", self.compartment)
    }
}

impl FromStr for Complex {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (agents, compartment) = parse_agents(s)?;
        Ok(Complex::new(agents, compartment))
    }
}

/// Parses `A{i}.B(x{a})::cell` into its agents, in written order, and compartment.
pub fn parse_agents(text: &str) -> Result<(Vec<Agent>, String), NotationError> {
    let text = text.trim();
    let (body, compartment) = text
        .rsplit_once("::")
        .ok_or_else(|| NotationError::MissingCompartment(text.to_string()))?;
    let compartment = compartment.trim();
    if !is_identifier(compartment) {
        return Err(NotationError::MissingCompartment(text.to_string()));
    }
    let mut agents = Vec::new();
    for part in split_top_level(body, '.') {
        agents.push(parse_agent(part.trim())?);
    }
    Ok((agents, compartment.to_string()))
}

fn parse_agent(text: &str) -> Result<Agent, NotationError> {
    let malformed = || NotationError::MalformedAgent(text.to_string());
    if let Some((name, rest)) = text.split_once('(') {
        let inner = rest.strip_suffix(')').ok_or_else(malformed)?;
        if !is_identifier(name) {
            return Err(malformed());
        }
        let mut atomics = Vec::new();
        for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            atomics.push(parse_atomic(part).ok_or_else(malformed)?);
        }
        return Ok(Agent::from(StructureAgent::new(name, atomics)?));
    }
    if text.contains('{') {
        return parse_atomic(text).map(Agent::from).ok_or_else(malformed);
    }
    if is_identifier(text) {
        return Ok(Agent::from(StructureAgent::empty(text)));
    }
    Err(malformed())
}

fn parse_atomic(text: &str) -> Option<AtomicAgent> {
    let (name, rest) = text.split_once('{')?;
    let state = rest.strip_suffix('}')?;
    let state_ok = state == crate::agent::WILDCARD || is_identifier(state);
    (is_identifier(name) && state_ok).then(|| AtomicAgent::new(name, state))
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits on `separator` outside parentheses and braces.
pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth = depth.saturating_sub(1),
            _ if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
