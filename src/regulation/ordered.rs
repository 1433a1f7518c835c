//! Ordered regulation: a partial order over labels.

use super::{last_label, Policy};
use crate::ts::{Candidate, MemoryLevel, State};
use std::collections::BTreeSet;

/// A pair `(a, b)` gives `a` priority over `b`: right after `a` fired,
/// `b` may not. The order is closed transitively on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ordered {
    order: BTreeSet<(String, String)>,
}

impl Ordered {
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            order: transitive_closure(pairs.into_iter().collect()),
        }
    }

    /// Whether `higher` dominates `lower` in the closed order.
    pub fn dominates(&self, higher: &str, lower: &str) -> bool {
        self.order.contains(&(higher.to_string(), lower.to_string()))
    }

    pub fn pairs(&self) -> &BTreeSet<(String, String)> {
        &self.order
    }
}

fn transitive_closure(mut order: BTreeSet<(String, String)>) -> BTreeSet<(String, String)> {
    loop {
        let implied: Vec<(String, String)> = order
            .iter()
            .flat_map(|(x, y)| {
                order
                    .iter()
                    .filter(move |(q, _)| q == y)
                    .map(move |(_, w)| (x.clone(), w.clone()))
            })
            .filter(|pair| !order.contains(pair))
            .collect();
        if implied.is_empty() {
            return order;
        }
        order.extend(implied);
    }
}

impl Policy for Ordered {
    const NAME: &'static str = "ordered";

    fn memory(&self) -> MemoryLevel {
        MemoryLevel::Last
    }

    fn filter<'a>(&self, state: &State, candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
        let Some(last) = last_label(state) else {
            return candidates;
        };
        candidates
            .into_iter()
            .filter(|c| !c.label.is_some_and(|label| self.dominates(last, label)))
            .collect()
    }

    fn referenced_labels(&self) -> BTreeSet<&str> {
        self.order
            .iter()
            .flat_map(|(a, b)| [a.as_str(), b.as_str()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulation::test_support::{after, candidate, labels_of};

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn closure_is_transitive() {
        let order = Ordered::new([pair("a", "b"), pair("b", "c")]);
        assert!(order.dominates("a", "c"));
        assert!(!order.dominates("c", "a"));
        assert_eq!(order.pairs().len(), 3);
    }

    #[test]
    fn excludes_labels_dominated_by_the_last_firing() {
        let order = Ordered::new([pair("a", "b")]);
        let all = || vec![candidate("a"), candidate("b")];
        assert_eq!(labels_of(&order.filter(&after(MemoryLevel::Last, &[]), all())), ["a", "b"]);
        assert_eq!(labels_of(&order.filter(&after(MemoryLevel::Last, &["a"]), all())), ["a"]);
        assert_eq!(labels_of(&order.filter(&after(MemoryLevel::Last, &["b"]), all())), ["a", "b"]);
    }
}
