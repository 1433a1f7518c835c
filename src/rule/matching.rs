//! Direct-mode application of rules to concrete states.
//!
//! Matching assigns every reactant complex of the rule to a distinct complex
//! occurrence of the state and aligns the pattern's agents onto it. Each
//! branch of the search owns its own copy of the remaining multiset.

use super::Rule;
use crate::agent::Agent;
use crate::complex::Complex;
use crate::multiset::Multiset;
use crate::rate::Definitions;
use rand::seq::SliceRandom;
use rand::Rng;

/// One way to match a rule's reactants in a state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleMatch {
    complexes: Vec<Complex>,
    agents: Vec<Agent>,
}

impl RuleMatch {
    /// The matched state complexes, one per reactant complex.
    pub fn complexes(&self) -> &[Complex] {
        &self.complexes
    }

    /// Concrete agents aligned with the rule's reactant positions.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }
}

impl Rule {
    /// Every match of the reactants in `state`, or `None` if there is none.
    ///
    /// A rule without reactants has exactly one, empty, match.
    pub fn match_all(&self, state: &Multiset) -> Option<Vec<RuleMatch>> {
        let ranges: Vec<(usize, usize)> = self.lhs_ranges().collect();
        let mut found = Vec::new();
        self.find_matches(&ranges, state.clone(), &mut Vec::new(), &mut found);
        (!found.is_empty()).then_some(found)
    }

    /// One match chosen uniformly at random.
    pub fn match_random<R: Rng + ?Sized>(&self, state: &Multiset, rng: &mut R) -> Option<RuleMatch> {
        self.match_all(state)?.choose(rng).cloned()
    }

    fn find_matches(
        &self,
        ranges: &[(usize, usize)],
        remaining: Multiset,
        partial: &mut Vec<(Complex, Vec<Agent>)>,
        found: &mut Vec<RuleMatch>,
    ) {
        let Some((&(from, to), rest)) = ranges.split_first() else {
            found.push(RuleMatch {
                complexes: partial.iter().map(|(c, _)| c.clone()).collect(),
                agents: partial.iter().flat_map(|(_, a)| a.iter().cloned()).collect(),
            });
            return;
        };
        let pattern = &self.agents[from..=to];
        let compartment = &self.compartments[from];

        for candidate in remaining.complexes() {
            if candidate.compartment() != compartment || candidate.len() != pattern.len() {
                continue;
            }
            let alignments = candidate.align_agents(pattern);
            if alignments.is_empty() {
                continue;
            }
            let Some(next) = remaining.checked_sub(&Multiset::from_complexes([candidate])) else {
                continue;
            };
            for alignment in alignments {
                partial.push((candidate.clone(), alignment));
                self.find_matches(rest, next.clone(), partial, found);
                partial.pop();
            }
        }
    }

    /// Products of applying the rule to a match.
    ///
    /// Each entangled product agent is its template with the matched
    /// reactant substituted in; produced-only agents are taken as written.
    pub fn replace(&self, matched: &RuleMatch) -> Multiset {
        let mut products = self.agents.clone();
        for &(l, r) in &self.pairs {
            if let (Some(l), Some(r)) = (l, r) {
                if let Some(agent) = matched.agents.get(l) {
                    products[r] = self.agents[r].replace(agent);
                }
            }
        }
        self.rhs_ranges()
            .map(|range| (self.complex_at(&products, range), 1))
            .collect()
    }

    /// The reactant complexes rebuilt from the matched agents.
    pub fn reconstruct_complexes_from_match(&self, matched: &RuleMatch) -> Multiset {
        let mut agents = matched.agents.clone();
        agents.extend_from_slice(&self.agents[agents.len().min(self.agents.len())..]);
        self.lhs_ranges()
            .map(|range| (self.complex_at(&agents, range), 1))
            .collect()
    }

    /// Rate in the given state; a rule without rate fires at rate 1.
    pub fn evaluate_rate(&self, state: &Multiset, definitions: &Definitions) -> Option<f64> {
        match &self.rate {
            Some(rate) => rate.evaluate(state, definitions),
            None => Some(1.0),
        }
    }
}
