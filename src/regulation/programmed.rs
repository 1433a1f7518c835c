//! Programmed regulation: successor sets per label.

use super::{last_label, Policy};
use crate::ts::{Candidate, MemoryLevel, State};
use std::collections::{BTreeMap, BTreeSet};

/// After a label with an entry, only its listed successors may fire.
/// Labels without an entry, and the empty history, leave every candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Programmed {
    successors: BTreeMap<String, BTreeSet<String>>,
}

impl Programmed {
    pub fn new(successors: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { successors }
    }

    pub fn successors(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.successors
    }
}

impl FromIterator<(String, Vec<String>)> for Programmed {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut successors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (label, next) in iter {
            successors.entry(label).or_default().extend(next);
        }
        Self { successors }
    }
}

impl Policy for Programmed {
    const NAME: &'static str = "programmed";

    fn memory(&self) -> MemoryLevel {
        MemoryLevel::Last
    }

    fn filter<'a>(&self, state: &State, candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
        let Some(allowed) = last_label(state).and_then(|last| self.successors.get(last)) else {
            return candidates;
        };
        candidates
            .into_iter()
            .filter(|c| c.label.is_some_and(|label| allowed.contains(label)))
            .collect()
    }

    fn referenced_labels(&self) -> BTreeSet<&str> {
        self.successors
            .iter()
            .flat_map(|(label, next)| std::iter::once(label).chain(next))
            .map(String::as_str)
            .collect()
    }
}
