//! Regulations: policies restricting which transitions may fire next.
//!
//! A regulation sees the current state, including its bounded firing
//! history, and the enabled candidates, and keeps a subset of them. Each
//! policy declares how much history it needs; states are built with that
//! memory level.
//!
//! - Programmed: each label lists the labels allowed to follow it.
//! - Ordered: a partial order; a label dominated by the last fired one is
//!   excluded.
//! - Conditional: a label is disabled while any of its forbidden complexes
//!   is present.
//! - Concurrent-free: when both labels of a priority pair are enabled, the
//!   lower one is dropped.
//! - Regular: the sequence of fired labels must stay a prefix of a word of a
//!   regular language.

pub mod concurrent_free;
pub mod conditional;
pub mod ordered;
pub mod programmed;
pub mod regular;

pub use concurrent_free::ConcurrentFree;
pub use conditional::Conditional;
pub use ordered::Ordered;
pub use programmed::Programmed;
pub use regular::Regular;

use crate::ts::{Candidate, MemoryLevel, State};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegulationError {
    #[error("label `{label}` used by the {policy} regulation is not defined in the model")]
    UnknownLabel { policy: &'static str, label: String },
    #[error("invalid regular expression `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("position {position} of `{pattern}` is not covered by any label")]
    UncoveredPattern { pattern: String, position: usize },
}

/// Behaviour shared by all regulation policies.
pub trait Policy {
    /// Name used in diagnostics.
    const NAME: &'static str;

    fn memory(&self) -> MemoryLevel;

    /// Keeps the candidates allowed to fire in `state`.
    fn filter<'a>(&self, state: &State, candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>>;

    /// Labels the policy refers to.
    fn referenced_labels(&self) -> BTreeSet<&str>;

    /// Fails if the policy refers to a label the model does not define.
    fn check_labels(&self, labels: &BTreeSet<String>) -> Result<(), RegulationError> {
        match self
            .referenced_labels()
            .into_iter()
            .find(|label| !labels.contains(*label))
        {
            Some(label) => Err(RegulationError::UnknownLabel {
                policy: Self::NAME,
                label: label.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// The label of the most recent firing, if it was labelled.
pub(crate) fn last_label(state: &State) -> Option<&str> {
    state.memory().last().flatten()
}

#[derive(Debug, Clone)]
pub enum Regulation {
    Programmed(Programmed),
    Ordered(Ordered),
    Conditional(Conditional),
    ConcurrentFree(ConcurrentFree),
    Regular(Regular),
}

macro_rules! dispatch {
    ($self:ident, $policy:ident => $body:expr) => {
        match $self {
            Regulation::Programmed($policy) => $body,
            Regulation::Ordered($policy) => $body,
            Regulation::Conditional($policy) => $body,
            Regulation::ConcurrentFree($policy) => $body,
            Regulation::Regular($policy) => $body,
        }
    };
}

impl Regulation {
    pub fn memory(&self) -> MemoryLevel {
        dispatch!(self, policy => policy.memory())
    }

    pub fn filter<'a>(&self, state: &State, candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
        dispatch!(self, policy => policy.filter(state, candidates))
    }

    pub fn check_labels(&self, labels: &BTreeSet<String>) -> Result<(), RegulationError> {
        dispatch!(self, policy => policy.check_labels(labels))
    }
}

impl From<Programmed> for Regulation {
    fn from(policy: Programmed) -> Self {
        Regulation::Programmed(policy)
    }
}

impl From<Ordered> for Regulation {
    fn from(policy: Ordered) -> Self {
        Regulation::Ordered(policy)
    }
}

impl From<Conditional> for Regulation {
    fn from(policy: Conditional) -> Self {
        Regulation::Conditional(policy)
    }
}

impl From<ConcurrentFree> for Regulation {
    fn from(policy: ConcurrentFree) -> Self {
        Regulation::ConcurrentFree(policy)
    }
}

impl From<Regular> for Regulation {
    fn from(policy: Regular) -> Self {
        Regulation::Regular(policy)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::multiset::Multiset;
    use crate::ts::{Candidate, Firing, Memory, MemoryLevel, State};

    pub fn candidate(label: &'static str) -> Candidate<'static> {
        Candidate {
            label: Some(label),
            rate: 1.0,
            firings: vec![Firing {
                consumed: Multiset::new(),
                produced: Multiset::new(),
            }],
        }
    }

    pub fn labels_of<'a>(candidates: &[Candidate<'a>]) -> Vec<&'a str> {
        candidates.iter().filter_map(|c| c.label).collect()
    }

    /// A state whose history is `fired`, under the given memory level.
    pub fn after(level: MemoryLevel, fired: &[&str]) -> State {
        let mut memory = Memory::new(level);
        for label in fired {
            memory = memory.update(Some(label));
        }
        State::new(Multiset::new(), memory)
    }
}
