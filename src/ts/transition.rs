//! The common view of rules and reactions used during exploration.

use crate::multiset::Multiset;
use crate::rate::Definitions;
use crate::reaction::Reaction;
use crate::rule::Rule;

/// What one application of a transition removes and adds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Firing {
    pub consumed: Multiset,
    pub produced: Multiset,
}

/// Anything that can fire in a state: a rule in direct mode or a ground
/// reaction after context completion.
pub trait Transition: Send + Sync {
    fn label(&self) -> Option<&str>;

    /// Rate in `state`, or `None` when it cannot be evaluated there.
    fn rate(&self, state: &Multiset, definitions: &Definitions) -> Option<f64>;

    /// Every distinct way to fire in `state`; empty when not applicable.
    fn firings(&self, state: &Multiset) -> Vec<Firing>;
}

impl Transition for Rule {
    fn label(&self) -> Option<&str> {
        Rule::label(self)
    }

    fn rate(&self, state: &Multiset, definitions: &Definitions) -> Option<f64> {
        self.evaluate_rate(state, definitions)
    }

    fn firings(&self, state: &Multiset) -> Vec<Firing> {
        let Some(matches) = self.match_all(state) else {
            return Vec::new();
        };
        matches
            .iter()
            .map(|m| Firing {
                consumed: self.reconstruct_complexes_from_match(m),
                produced: self.replace(m),
            })
            .collect()
    }
}

impl Transition for Reaction {
    fn label(&self) -> Option<&str> {
        Reaction::label(self)
    }

    fn rate(&self, state: &Multiset, definitions: &Definitions) -> Option<f64> {
        self.evaluate_rate(state, definitions)
    }

    fn firings(&self, state: &Multiset) -> Vec<Firing> {
        if !self.is_applicable(state) {
            return Vec::new();
        }
        vec![Firing {
            consumed: self.consumed().clone(),
            produced: self.produced().clone(),
        }]
    }
}

/// A transition that may fire in the current state, with its rate and the
/// firings it offers. Regulations filter these before successors are built.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub label: Option<&'a str>,
    pub rate: f64,
    pub firings: Vec<Firing>,
}

/// Collects the candidates of `state`: transitions with a positive, finite
/// rate and at least one firing.
pub fn candidates<'a, T: Transition>(
    transitions: &'a [T],
    state: &Multiset,
    definitions: &Definitions,
) -> Vec<Candidate<'a>> {
    transitions
        .iter()
        .filter_map(|t| {
            let rate = t.rate(state, definitions).filter(|r| r.is_finite() && *r > 0.0)?;
            let firings = t.firings(state);
            (!firings.is_empty()).then(|| Candidate {
                label: t.label(),
                rate,
                firings,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;

    fn state(entries: &[(&str, u32)]) -> Multiset {
        entries
            .iter()
            .map(|(c, n)| (c.parse::<Complex>().unwrap(), *n))
            .collect()
    }

    #[test]
    fn rule_and_reaction_agree_on_ground_transitions() {
        let rule: Rule = "r ~ X()::rep => @ 2".parse().unwrap();
        let reaction = rule.to_reaction();
        let s = state(&[("X()::rep", 2)]);
        assert_eq!(Transition::firings(&rule, &s), Transition::firings(&reaction, &s));
        assert_eq!(Transition::label(&reaction), Some("r"));
    }

    #[test]
    fn candidates_skip_zero_rates_and_missing_reactants() {
        let rules: Vec<Rule> = vec![
            "a ~ X()::rep => @ k*[X()::rep]".parse().unwrap(),
            "b ~ Y()::rep => ".parse().unwrap(),
            "c ~ => Y()::rep @ 0".parse().unwrap(),
        ];
        let defs = Definitions::from([("k".to_string(), 1.5)]);
        let found = candidates(&rules, &state(&[("X()::rep", 2)]), &defs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, Some("a"));
        assert_eq!(found[0].rate, 3.0);
    }
}
