//! Rules: symbolic, possibly under-specified rewrites of complexes.
//!
//! A rule is stored flat. `agents` lists reactant agents followed by product
//! agents, `mid` is the index of the first product agent, and `complexes`
//! groups consecutive agents into complexes by inclusive index ranges, each
//! living in the compartment recorded for its first agent. `pairs` entangles
//! reactant and product positions: `(Some(l), Some(r))` rewrites agent `l`
//! into agent `r`, `(Some(l), None)` consumes `l`, `(None, Some(r))` produces
//! `r`. Context completion ([`context`]) and direct-mode application
//! ([`matching`]) both follow the pairs.
//!
//! The textual form accepted by [`Rule::from_str`] is
//! `label ~ lhs => rhs @ rate`, where label and rate are optional.

pub mod context;
pub mod matching;

pub use matching::RuleMatch;

use crate::agent::Agent;
use crate::complex::{parse_agents, Complex, NotationError};
use crate::rate::{RateError, Rate};
use crate::reaction::Reaction;
use crate::side::{split_terms, Side};
use crate::signature::{SignatureError, Signatures};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Entanglement of a reactant position with a product position.
pub type Pair = (Option<usize>, Option<usize>);

/// Structural errors found while building a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error(transparent)]
    Notation(#[from] NotationError),
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error("rule `{0}` has no `=>` arrow")]
    MissingArrow(String),
    #[error("rule has {agents} agents but {compartments} compartments")]
    CompartmentCount { agents: usize, compartments: usize },
    #[error("split index {mid} exceeds {agents} agents")]
    SplitOutOfRange { mid: usize, agents: usize },
    #[error("complex ranges do not tile the agents contiguously")]
    ComplexCoverage,
    #[error("complex {from}..={to} straddles the reaction arrow")]
    StraddlingComplex { from: usize, to: usize },
    #[error("complex {from}..={to} mixes compartments")]
    MixedCompartments { from: usize, to: usize },
    #[error("pair entangles no agent")]
    EmptyPair,
    #[error("pair {pair:?} points to the wrong side or past the agents")]
    PairOutOfRange { pair: Pair },
    #[error("agent {index} is covered by {count} pairs instead of one")]
    PairCoverage { index: usize, count: usize },
}

/// A BCSL-style rewrite rule.
#[derive(Debug, Clone)]
pub struct Rule {
    agents: Vec<Agent>,
    mid: usize,
    compartments: Vec<String>,
    complexes: Vec<(usize, usize)>,
    pairs: Vec<Pair>,
    rate: Option<Rate>,
    label: Option<String>,
}

impl Rule {
    /// Builds a rule from its flat representation, validating its structure.
    pub fn new(
        agents: Vec<Agent>,
        mid: usize,
        compartments: Vec<String>,
        complexes: Vec<(usize, usize)>,
        pairs: Vec<Pair>,
        rate: Option<Rate>,
        label: Option<String>,
    ) -> Result<Self, RuleError> {
        let rule = Self {
            agents,
            mid,
            compartments,
            complexes,
            pairs,
            rate,
            label,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    fn validate(&self) -> Result<(), RuleError> {
        let n = self.agents.len();
        if self.compartments.len() != n {
            return Err(RuleError::CompartmentCount {
                agents: n,
                compartments: self.compartments.len(),
            });
        }
        if self.mid > n {
            return Err(RuleError::SplitOutOfRange { mid: self.mid, agents: n });
        }

        let mut next = 0;
        for &(from, to) in &self.complexes {
            if from != next || to < from || to >= n {
                return Err(RuleError::ComplexCoverage);
            }
            if from < self.mid && to >= self.mid {
                return Err(RuleError::StraddlingComplex { from, to });
            }
            if self.compartments[from..=to].iter().any(|c| c != &self.compartments[from]) {
                return Err(RuleError::MixedCompartments { from, to });
            }
            next = to + 1;
        }
        if next != n {
            return Err(RuleError::ComplexCoverage);
        }

        let mut covered = vec![0usize; n];
        for &pair in &self.pairs {
            match pair {
                (None, None) => return Err(RuleError::EmptyPair),
                (l, r) => {
                    let lhs_ok = l.map_or(true, |l| l < self.mid);
                    let rhs_ok = r.map_or(true, |r| r >= self.mid && r < n);
                    if !lhs_ok || !rhs_ok {
                        return Err(RuleError::PairOutOfRange { pair });
                    }
                    for index in [l, r].into_iter().flatten() {
                        covered[index] += 1;
                    }
                }
            }
        }
        let shared = self.is_replication().then(|| self.pairs[0].0).flatten();
        for (index, &count) in covered.iter().enumerate() {
            if count != 1 && Some(index) != shared {
                return Err(RuleError::PairCoverage { index, count });
            }
        }
        Ok(())
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Index of the first product agent.
    pub fn mid(&self) -> usize {
        self.mid
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn rate(&self) -> Option<&Rate> {
        self.rate.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn set_rate(&mut self, rate: Rate) {
        self.rate = Some(rate);
    }

    /// Inclusive agent ranges of the reactant complexes.
    pub(crate) fn lhs_ranges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.complexes.iter().copied().filter(|&(_, to)| to < self.mid)
    }

    /// Inclusive agent ranges of the product complexes.
    pub(crate) fn rhs_ranges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.complexes.iter().copied().filter(|&(from, _)| from >= self.mid)
    }

    pub(crate) fn complex_at(&self, agents: &[Agent], (from, to): (usize, usize)) -> Complex {
        Complex::new(agents[from..=to].iter().cloned(), self.compartments[from].clone())
    }

    /// Left- and right-hand sides as complexes.
    pub fn create_complexes(&self) -> (Side, Side) {
        self.sides_of(&self.agents)
    }

    fn sides_of(&self, agents: &[Agent]) -> (Side, Side) {
        let lhs = self.lhs_ranges().map(|range| self.complex_at(agents, range)).collect();
        let rhs = self.rhs_ranges().map(|range| self.complex_at(agents, range)).collect();
        (Side::new(lhs), Side::new(rhs))
    }

    /// The rule as a reaction; a missing rate becomes the constant 1.
    pub fn to_reaction(&self) -> Reaction {
        self.reaction_of(&self.agents)
    }

    pub(crate) fn reaction_of(&self, agents: &[Agent]) -> Reaction {
        let (lhs, rhs) = self.sides_of(agents);
        let rate = self.rate.clone().unwrap_or_else(|| Rate::number(1.0));
        Reaction::new(lhs, rhs, rate, self.label.clone())
    }

    /// The backward rule of a reversible rule.
    ///
    /// Returns `(forward, backward)`; labelled rules get `_fw` and `_bw`
    /// suffixes. The backward rule uses `backward_rate` when given, the
    /// forward rate otherwise.
    pub fn create_reversible(&self, backward_rate: Option<Rate>) -> Result<(Rule, Rule), RuleError> {
        let n = self.agents.len();
        let rotate = |i: usize| (i + n - self.mid) % n.max(1);

        let mut agents = self.agents[self.mid..].to_vec();
        agents.extend_from_slice(&self.agents[..self.mid]);
        let mut compartments = self.compartments[self.mid..].to_vec();
        compartments.extend_from_slice(&self.compartments[..self.mid]);
        let mut complexes: Vec<_> = self
            .complexes
            .iter()
            .map(|&(from, to)| (rotate(from), rotate(to)))
            .collect();
        complexes.sort_unstable();
        let mid = n - self.mid;

        let pairs = if self.is_replication() {
            default_pairs(&agents[..mid], &agents[mid..])
        } else {
            self.pairs
                .iter()
                .map(|&(l, r)| (r.map(rotate), l.map(rotate)))
                .collect()
        };

        let (forward_label, backward_label) = match &self.label {
            Some(label) => (Some(format!("{label}_fw")), Some(format!("{label}_bw"))),
            None => (None, None),
        };
        let forward = Rule {
            label: forward_label,
            ..self.clone()
        };
        let backward = Rule::new(
            agents,
            mid,
            compartments,
            complexes,
            pairs,
            backward_rate.or_else(|| self.rate.clone()),
            backward_label,
        )?;
        Ok((forward, backward))
    }

    /// The rule with every agent and rate pattern stripped of context.
    ///
    /// The label is dropped, as the result no longer names the same rewrite.
    pub fn reduce_context(&self) -> Rule {
        Rule {
            agents: self.agents.iter().map(Agent::reduce_context).collect(),
            rate: self.rate.as_ref().map(Rate::reduce_context),
            label: None,
            ..self.clone()
        }
    }

    /// Whether applying the rule changes anything.
    pub fn is_meaningful(&self) -> bool {
        let (lhs, rhs) = self.create_complexes();
        lhs != rhs
    }

    /// Position-wise compatibility of both sides.
    pub fn compatible(&self, other: &Rule) -> bool {
        self.to_reaction().compatible(&other.to_reaction())
    }

    /// Whether some product complex describes the given complex.
    pub fn exists_compatible_agent(&self, complex: &Complex) -> bool {
        let (_, rhs) = self.create_complexes();
        rhs.exists_compatible_agent(complex)
    }

    /// Every fully specified complex denoted by either side.
    pub fn create_all_compatible(
        &self,
        signatures: &Signatures,
    ) -> Result<BTreeSet<Complex>, SignatureError> {
        self.to_reaction().create_all_compatible(signatures)
    }

    pub fn extend_signature(&self, signatures: &mut Signatures) {
        for agent in &self.agents {
            agent.extend_signature(signatures);
        }
    }

    /// Turns agent patterns of the rate into masks over an ordering.
    pub fn rate_to_vector(&mut self, ordering: &[Complex], definitions: &crate::rate::Definitions) {
        if let Some(rate) = &self.rate {
            self.rate = Some(rate.vectorize(ordering, definitions));
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.agents == other.agents
            && self.mid == other.mid
            && self.compartments == other.compartments
            && self.complexes == other.complexes
            && self.pairs == other.pairs
            && self.rate.as_ref().map(Rate::to_string) == other.rate.as_ref().map(Rate::to_string)
            && self.label == other.label
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{} ~ ", label)?;
        }
        let render = |ranges: Vec<(usize, usize)>| {
            ranges
                .into_iter()
                .map(|range| self.complex_at(&self.agents, range).to_string())
                .collect::<Vec<_>>()
                .join(" + ")
        };
        write!(
            f,
            "{} => {}",
            render(self.lhs_ranges().collect()),
            render(self.rhs_ranges().collect())
        )?;
        if let Some(rate) = &self.rate {
            write!(f, " @ {}", rate)?;
        }
        Ok(())
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, body) = match s.split_once('~') {
            Some((label, body)) => (Some(label.trim().to_string()), body),
            None => (None, s),
        };
        let (lhs, rest) = body
            .split_once("=>")
            .ok_or_else(|| RuleError::MissingArrow(s.trim().to_string()))?;
        let (rhs, rate) = match rest.split_once('@') {
            Some((rhs, rate)) => (rhs, Some(rate.trim().parse::<Rate>()?)),
            None => (rest, None),
        };
        let mut builder = Rule::builder().lhs(lhs)?.rhs(rhs)?;
        if let Some(rate) = rate {
            builder = builder.rate(rate);
        }
        if let Some(label) = label {
            builder = builder.label(label);
        }
        builder.build()
    }
}

/// Pairs the parser infers when none are given.
///
/// Agents are entangled position by position. Surplus reactants are
/// consumed; surplus products are produced, except that a single reactant
/// whose identical copies fill the right-hand side forms a replication.
pub fn default_pairs(lhs: &[Agent], rhs: &[Agent]) -> Vec<Pair> {
    let mid = lhs.len();
    let common = lhs.len().min(rhs.len());
    let mut pairs: Vec<Pair> = (0..common).map(|i| (Some(i), Some(i + mid))).collect();
    pairs.extend((common..lhs.len()).map(|i| (Some(i), None)));
    for i in common..rhs.len() {
        let replicated = lhs.len() == 1 && lhs[0] == rhs[0] && rhs[i] == rhs[0];
        pairs.push(if replicated { (Some(0), Some(i + mid)) } else { (None, Some(i + mid)) });
    }
    pairs
}

/// Incremental construction of a [`Rule`] from complex notation.
#[derive(Debug, Clone, Default)]
pub struct RuleBuilder {
    lhs: Vec<(Vec<Agent>, String)>,
    rhs: Vec<(Vec<Agent>, String)>,
    pairs: Option<Vec<Pair>>,
    rate: Option<Rate>,
    label: Option<String>,
}

fn parse_side(notation: &str) -> Result<Vec<(Vec<Agent>, String)>, NotationError> {
    split_terms(notation)?.into_iter().map(parse_agents).collect()
}

impl RuleBuilder {
    /// Sets the reactants from side notation, e.g. `2 A{i}::cell + B()::cell`.
    pub fn lhs(mut self, notation: &str) -> Result<Self, RuleError> {
        self.lhs = parse_side(notation)?;
        Ok(self)
    }

    /// Sets the products from side notation.
    pub fn rhs(mut self, notation: &str) -> Result<Self, RuleError> {
        self.rhs = parse_side(notation)?;
        Ok(self)
    }

    /// Appends one reactant complex; agent order is kept for pairing.
    pub fn lhs_complex(mut self, agents: Vec<Agent>, compartment: impl Into<String>) -> Self {
        self.lhs.push((agents, compartment.into()));
        self
    }

    /// Appends one product complex; agent order is kept for pairing.
    pub fn rhs_complex(mut self, agents: Vec<Agent>, compartment: impl Into<String>) -> Self {
        self.rhs.push((agents, compartment.into()));
        self
    }

    /// Overrides the inferred pairs; indices are absolute agent positions.
    pub fn pairs(mut self, pairs: Vec<Pair>) -> Self {
        self.pairs = Some(pairs);
        self
    }

    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn build(self) -> Result<Rule, RuleError> {
        let mut agents = Vec::new();
        let mut compartments = Vec::new();
        let mut complexes = Vec::new();
        let mut mid = 0;
        for (side, is_lhs) in [(self.lhs, true), (self.rhs, false)] {
            for (members, compartment) in side {
                if members.is_empty() {
                    continue;
                }
                let from = agents.len();
                compartments.extend(std::iter::repeat(compartment).take(members.len()));
                agents.extend(members);
                complexes.push((from, agents.len() - 1));
            }
            if is_lhs {
                mid = agents.len();
            }
        }
        let pairs = self
            .pairs
            .unwrap_or_else(|| default_pairs(&agents[..mid], &agents[mid..]));
        Rule::new(agents, mid, compartments, complexes, pairs, self.rate, self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labelled_rule() {
        let rule: Rule = "r1 ~ A{i}::c + B()::c => A{a}.B()::c @ k*[A{i}::c]".parse().unwrap();
        assert_eq!(rule.label(), Some("r1"));
        assert_eq!(rule.mid(), 2);
        assert_eq!(rule.pairs(), &[(Some(0), Some(2)), (Some(1), Some(3))]);
        assert_eq!(rule.to_string(), "r1 ~ A{i}::c + B()::c => A{a}.B()::c @ k*[A{i}::c]");
    }

    #[test]
    fn infers_consumption_production_and_replication() {
        let decay: Rule = "X()::rep => ".parse().unwrap();
        assert_eq!(decay.pairs(), &[(Some(0), None)]);
        let birth: Rule = "=> X()::rep".parse().unwrap();
        assert_eq!(birth.pairs(), &[(None, Some(0))]);
        let rep: Rule = "A()::c => A()::c + A()::c".parse().unwrap();
        assert_eq!(rep.pairs(), &[(Some(0), Some(1)), (Some(0), Some(2))]);
        assert!(rep.is_replication());
    }

    #[test]
    fn rejects_incomplete_pair_coverage() {
        let err = Rule::builder()
            .lhs("A{i}::c + B{i}::c")
            .unwrap()
            .rhs("A{a}::c")
            .unwrap()
            .pairs(vec![(Some(0), Some(2))])
            .build()
            .unwrap_err();
        assert_eq!(err, RuleError::PairCoverage { index: 1, count: 0 });

        let err = Rule::builder()
            .lhs("A{i}::c")
            .unwrap()
            .rhs("A{a}::c")
            .unwrap()
            .pairs(vec![(Some(1), Some(0))])
            .build()
            .unwrap_err();
        assert!(matches!(err, RuleError::PairOutOfRange { .. }));
        assert!(matches!("A{i}::c".parse::<Rule>(), Err(RuleError::MissingArrow(_))));
    }

    #[test]
    fn rejects_straddling_complex() {
        let agents: Vec<Agent> = vec![
            crate::agent::AtomicAgent::new("A", "i").into(),
            crate::agent::AtomicAgent::new("A", "a").into(),
        ];
        let err = Rule::new(
            agents,
            1,
            vec!["c".into(), "c".into()],
            vec![(0, 1)],
            vec![(Some(0), Some(1))],
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, RuleError::StraddlingComplex { from: 0, to: 1 });
    }

    #[test]
    fn reversible_rule_swaps_sides() {
        let rule: Rule = "bind ~ A{i}::c + B{_}::c => A{i}.B{_}::c @ k1".parse().unwrap();
        let (forward, backward) = rule.create_reversible(Some("k2".parse().unwrap())).unwrap();
        assert_eq!(forward.label(), Some("bind_fw"));
        assert_eq!(backward.label(), Some("bind_bw"));
        assert_eq!(backward.to_string(), "bind_bw ~ A{i}.B{_}::c => A{i}::c + B{_}::c @ k2");
        assert_eq!(backward.pairs(), &[(Some(0), Some(2)), (Some(1), Some(3))]);
    }

    #[test]
    fn reduced_rule_may_lose_meaning() {
        let rule: Rule = "A{i}::c => A{a}::c".parse().unwrap();
        assert!(rule.is_meaningful());
        let reduced = rule.reduce_context();
        assert_eq!(reduced.to_string(), "A{_}::c => A{_}::c");
        assert!(!reduced.is_meaningful());
    }

    #[test]
    fn static_queries_follow_sides() {
        let rule: Rule = "A{_}::c => A{_}::c + B{i}::c".parse().unwrap();
        let general: Rule = "A{_}::c => A{_}::c".parse().unwrap();
        assert!(rule.exists_compatible_agent(&"B{i}::c".parse().unwrap()));
        assert!(!rule.exists_compatible_agent(&"C{i}::c".parse().unwrap()));
        assert!(general.compatible(&rule));
        assert!(!rule.compatible(&general));
    }
}
