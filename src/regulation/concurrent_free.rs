//! Concurrent-free regulation: priorities between simultaneously enabled
//! labels.

use super::Policy;
use crate::ts::{Candidate, MemoryLevel, State};
use std::collections::BTreeSet;

/// Pairs `(p, q)`: whenever `p` and `q` are both enabled, `q` is dropped.
/// Pairs are applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcurrentFree {
    priorities: Vec<(String, String)>,
}

impl ConcurrentFree {
    pub fn new(priorities: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            priorities: priorities.into_iter().collect(),
        }
    }
}

impl Policy for ConcurrentFree {
    const NAME: &'static str = "concurrent-free";

    fn memory(&self) -> MemoryLevel {
        MemoryLevel::None
    }

    fn filter<'a>(&self, _state: &State, mut candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
        for (preferred, other) in &self.priorities {
            let enabled = |label: &str| candidates.iter().any(|c| c.label == Some(label));
            if enabled(preferred) && enabled(other) {
                candidates.retain(|c| c.label != Some(other.as_str()));
            }
        }
        candidates
    }

    fn referenced_labels(&self) -> BTreeSet<&str> {
        self.priorities
            .iter()
            .flat_map(|(a, b)| [a.as_str(), b.as_str()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulation::test_support::{after, candidate, labels_of};

    #[test]
    fn drops_the_lower_label_only_when_both_are_enabled() {
        let policy = ConcurrentFree::new([("a".to_string(), "b".to_string())]);
        let state = after(MemoryLevel::None, &[]);
        assert_eq!(
            labels_of(&policy.filter(&state, vec![candidate("a"), candidate("b"), candidate("c")])),
            ["a", "c"]
        );
        assert_eq!(
            labels_of(&policy.filter(&state, vec![candidate("b"), candidate("c")])),
            ["b", "c"]
        );
    }
}
