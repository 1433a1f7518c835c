//! Ground reactions: a rule reduced to multisets of complexes and a rate.

use crate::complex::Complex;
use crate::multiset::Multiset;
use crate::rate::{Definitions, Rate};
use crate::side::Side;
use crate::signature::{SignatureError, Signatures};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// `lhs => rhs @ rate`.
///
/// Identity is the pair of sides plus the rendered rate; the label is
/// carried along but does not distinguish reactions.
#[derive(Debug, Clone)]
pub struct Reaction {
    lhs: Side,
    rhs: Side,
    rate: Rate,
    label: Option<String>,
    consumed: Multiset,
    produced: Multiset,
}

impl Reaction {
    pub fn new(lhs: Side, rhs: Side, rate: Rate, label: Option<String>) -> Self {
        let consumed = lhs.to_multiset();
        let produced = rhs.to_multiset();
        Self {
            lhs,
            rhs,
            rate,
            label,
            consumed,
            produced,
        }
    }

    pub fn lhs(&self) -> &Side {
        &self.lhs
    }

    pub fn rhs(&self) -> &Side {
        &self.rhs
    }

    pub fn rate(&self) -> &Rate {
        &self.rate
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn consumed(&self) -> &Multiset {
        &self.consumed
    }

    pub fn produced(&self) -> &Multiset {
        &self.produced
    }

    /// The same reaction with its rate replaced.
    pub fn with_rate(&self, rate: Rate) -> Reaction {
        Reaction {
            rate,
            ..self.clone()
        }
    }

    /// Whether the reactants are present in the state.
    pub fn is_applicable(&self, state: &Multiset) -> bool {
        state.contains(&self.consumed)
    }

    pub fn evaluate_rate(&self, state: &Multiset, definitions: &Definitions) -> Option<f64> {
        self.rate.evaluate(state, definitions)
    }

    /// Position-wise compatibility of both sides.
    pub fn compatible(&self, other: &Reaction) -> bool {
        self.lhs.compatible(&other.lhs) && self.rhs.compatible(&other.rhs)
    }

    /// Every fully specified complex denoted by either side.
    pub fn create_all_compatible(
        &self,
        signatures: &Signatures,
    ) -> Result<BTreeSet<Complex>, SignatureError> {
        let mut all = self.lhs.create_all_compatible(signatures)?;
        all.extend(self.rhs.create_all_compatible(signatures)?);
        Ok(all)
    }

    fn key(&self) -> (&Multiset, &Multiset, String) {
        (&self.consumed, &self.produced, self.rate.to_string())
    }
}

impl PartialEq for Reaction {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Reaction {}

impl Hash for Reaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Reaction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reaction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{} ~ ", label)?;
        }
        write!(f, "{} => {} @ {}", self.lhs, self.rhs, self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(lhs: &str, rhs: &str, rate: &str) -> Reaction {
        Reaction::new(lhs.parse().unwrap(), rhs.parse().unwrap(), rate.parse().unwrap(), None)
    }

    #[test]
    fn applicability_is_containment() {
        let r = reaction("2 X()::rep", "Y()::rep", "k");
        let state: Multiset = [("X()::rep".parse().unwrap(), 2)].into_iter().collect();
        assert!(r.is_applicable(&state));
        let short: Multiset = [("X()::rep".parse().unwrap(), 1)].into_iter().collect();
        assert!(!r.is_applicable(&short));
    }

    #[test]
    fn identity_ignores_order_and_label() {
        let a = reaction("X()::rep + Y()::rep", "", "k");
        let mut b = reaction("Y()::rep + X()::rep", "", "k");
        b.label = Some("r1".into());
        assert_eq!(a, b);
        assert_ne!(a, reaction("X()::rep + Y()::rep", "", "k2"));
        assert_eq!(b.to_string(), "r1 ~ 1 X()::rep + 1 Y()::rep =>  @ k");
    }
}
