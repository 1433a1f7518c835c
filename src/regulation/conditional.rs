//! Conditional regulation: labels disabled by the presence of complexes.

use super::Policy;
use crate::complex::Complex;
use crate::ts::{Candidate, MemoryLevel, State};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditional {
    forbidden: BTreeMap<String, BTreeSet<Complex>>,
}

impl Conditional {
    pub fn new(forbidden: BTreeMap<String, BTreeSet<Complex>>) -> Self {
        Self { forbidden }
    }

    pub fn forbidden(&self, label: &str) -> Option<&BTreeSet<Complex>> {
        self.forbidden.get(label)
    }
}

impl Policy for Conditional {
    const NAME: &'static str = "conditional";

    fn memory(&self) -> MemoryLevel {
        MemoryLevel::None
    }

    fn filter<'a>(&self, state: &State, candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
        candidates
            .into_iter()
            .filter(|c| {
                c.label
                    .and_then(|label| self.forbidden.get(label))
                    .map_or(true, |complexes| !state.content().intersects(complexes))
            })
            .collect()
    }

    fn referenced_labels(&self) -> BTreeSet<&str> {
        self.forbidden.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiset::Multiset;
    use crate::regulation::test_support::{candidate, labels_of};
    use crate::ts::Memory;

    #[test]
    fn present_complexes_disable_labels() {
        let inhibitor: Complex = "I()::c".parse().unwrap();
        let policy = Conditional::new(BTreeMap::from([(
            "b".to_string(),
            BTreeSet::from([inhibitor.clone()]),
        )]));
        let all = || vec![candidate("a"), candidate("b")];

        let free = State::new(Multiset::new(), Memory::default());
        assert_eq!(labels_of(&policy.filter(&free, all())), ["a", "b"]);

        let inhibited = State::new(Multiset::from_complexes([&inhibitor]), Memory::default());
        assert_eq!(labels_of(&policy.filter(&inhibited, all())), ["a"]);
    }
}
