//! Models: rules, an initial state and rate definitions, plus the analyses
//! run on them.

use crate::complex::Complex;
use crate::config::{ConfigError, GenerationConfig, GenerationMode};
use crate::multiset::Multiset;
use crate::rate::{Definitions, Rate};
use crate::reaction::Reaction;
use crate::regulation::{Regulation, RegulationError};
use crate::rule::Rule;
use crate::signature::{SignatureError, Signatures};
use crate::simulation::{self, Trajectory};
use crate::ts::worker::{self, Expander};
use crate::ts::{Memory, MemoryLevel, Outcome, PersistError, State, Transition, TransitionSystem};
use rand::Rng;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("missing signature entry: {0}")]
    MissingSignature(#[from] SignatureError),
    #[error(transparent)]
    Regulation(#[from] RegulationError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("checkpoint was generated with bound {found}, not {expected}")]
    BoundMismatch { expected: u32, found: u32 },
    #[error("checkpoint states keep {found:?} memory, the model needs {expected:?}")]
    MemoryMismatch {
        expected: MemoryLevel,
        found: MemoryLevel,
    },
}

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct Generation {
    pub ts: TransitionSystem,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct Model {
    rules: Vec<Rule>,
    init: Multiset,
    definitions: Definitions,
    params: BTreeSet<String>,
    regulation: Option<Regulation>,
    signatures: Signatures,
    all_rates: bool,
}

impl Model {
    /// Builds a model.
    ///
    /// Rules without a rate get the constant rate 1. Signatures are derived
    /// from every agent in the rules, their rates and the initial state. The
    /// regulation, if any, may only refer to labels of the rules.
    pub fn new(
        mut rules: Vec<Rule>,
        init: Multiset,
        definitions: Definitions,
        params: BTreeSet<String>,
        regulation: Option<Regulation>,
    ) -> Result<Self, ModelError> {
        let mut all_rates = true;
        for rule in &mut rules {
            if rule.rate().is_none() {
                rule.set_rate(Rate::number(1.0));
                all_rates = false;
            }
        }

        let rate_complexes: Vec<&Complex> = rules
            .iter()
            .filter_map(Rule::rate)
            .flat_map(Rate::agents)
            .collect();
        let agents = rules
            .iter()
            .flat_map(|r| r.agents().iter())
            .chain(init.complexes().flat_map(|c| c.agents().iter()))
            .chain(rate_complexes.iter().flat_map(|c| c.agents().iter()));
        let signatures = Signatures::from_agents(agents);

        if let Some(regulation) = &regulation {
            let labels: BTreeSet<String> = rules
                .iter()
                .filter_map(|r| r.label().map(str::to_string))
                .collect();
            regulation.check_labels(&labels)?;
        }

        debug!(rules = rules.len(), all_rates, "model created");
        Ok(Self {
            rules,
            init,
            definitions,
            params,
            regulation,
            signatures,
            all_rates,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn init(&self) -> &Multiset {
        &self.init
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn params(&self) -> &BTreeSet<String> {
        &self.params
    }

    pub fn regulation(&self) -> Option<&Regulation> {
        self.regulation.as_ref()
    }

    pub fn signatures(&self) -> &Signatures {
        &self.signatures
    }

    /// Whether every rule was given an explicit rate.
    pub fn all_rates(&self) -> bool {
        self.all_rates
    }

    /// History kept by states, as required by the regulation.
    pub fn memory_level(&self) -> MemoryLevel {
        self.regulation
            .as_ref()
            .map(Regulation::memory)
            .unwrap_or_default()
    }

    /// Ground reactions of all rules, with defined parameters substituted.
    pub fn reactions(&self) -> Result<Vec<Reaction>, ModelError> {
        let mut reactions = Vec::new();
        for rule in &self.rules {
            for reaction in rule.create_reactions(&self.signatures)? {
                let rate = reaction.rate().substitute(&self.definitions);
                reactions.push(reaction.with_rate(rate));
            }
        }
        info!(rules = self.rules.len(), reactions = reactions.len(), "reactions created");
        Ok(reactions)
    }

    /// Sorted set of every concrete complex the model can refer to.
    pub fn create_ordering(&self) -> Result<Vec<Complex>, ModelError> {
        let mut all: BTreeSet<Complex> = self.init.complexes().cloned().collect();
        for rule in &self.rules {
            all.extend(rule.create_all_compatible(&self.signatures)?);
        }
        Ok(all.into_iter().collect())
    }

    /// Largest stoichiometric coefficient in any rule side or the initial
    /// state.
    pub fn compute_bound(&self) -> u32 {
        self.rules
            .iter()
            .map(|rule| {
                let (lhs, rhs) = rule.create_complexes();
                lhs.most_frequent().max(rhs.most_frequent())
            })
            .chain(std::iter::once(self.init.max_count()))
            .max()
            .unwrap_or(0)
    }

    /// Explores the state space from the initial state.
    ///
    /// The bound defaults to [`compute_bound`](Self::compute_bound).
    pub fn generate_transition_system(
        &self,
        config: &GenerationConfig,
    ) -> Result<Generation, ModelError> {
        config.validate()?;
        let bound = config.bound.unwrap_or_else(|| self.compute_bound());
        let init = State::new(self.init.clone(), Memory::new(self.memory_level()));
        info!(bound, mode = ?config.mode, threads = config.threads, "generating transition system");
        self.explore(TransitionSystem::new(init, bound), config)
    }

    /// Continues exploring a partially generated system.
    pub fn resume_transition_system(
        &self,
        ts: TransitionSystem,
        config: &GenerationConfig,
    ) -> Result<Generation, ModelError> {
        config.validate()?;
        if let Some(expected) = config.bound.filter(|&b| b != ts.bound()) {
            return Err(ModelError::BoundMismatch {
                expected,
                found: ts.bound(),
            });
        }
        if ts.memory_level() != self.memory_level() {
            return Err(ModelError::MemoryMismatch {
                expected: self.memory_level(),
                found: ts.memory_level(),
            });
        }
        info!(
            states = ts.len(),
            unprocessed = ts.frontier_len(),
            "resuming transition system"
        );
        self.explore(ts, config)
    }

    fn explore(&self, mut ts: TransitionSystem, config: &GenerationConfig) -> Result<Generation, ModelError> {
        ts.set_params(
            self.params
                .iter()
                .filter(|p| !self.definitions.contains_key(*p))
                .cloned(),
        );
        let (ts, outcome) = match config.mode {
            GenerationMode::Direct => self.explore_with(ts, &self.rules, config),
            GenerationMode::Reactions => {
                let reactions = self.reactions()?;
                self.explore_with(ts, &reactions, config)
            }
        };
        Ok(Generation { ts, outcome })
    }

    fn explore_with<T: Transition>(
        &self,
        ts: TransitionSystem,
        transitions: &[T],
        config: &GenerationConfig,
    ) -> (TransitionSystem, Outcome) {
        let expander = Expander {
            transitions,
            definitions: &self.definitions,
            regulation: self.regulation.as_ref(),
            bound: ts.bound(),
        };
        worker::explore(ts, &expander, config)
    }

    /// Whether `complex` can be ruled out as reachable without exploring:
    /// it is neither described by a product of any rule nor present
    /// initially.
    pub fn static_non_reachability(&self, complex: &Complex) -> bool {
        let related = |c: &Complex| c.compatible(complex) || complex.compatible(c);
        let produced = self.rules.iter().any(|rule| {
            let (_, rhs) = rule.create_complexes();
            rhs.complexes().iter().any(related)
        });
        !produced && !self.init.complexes().any(related)
    }

    /// Pairs `(general, redundant)` of distinct rules where the first is
    /// compatible with the second, so the second adds no behaviour.
    pub fn redundant_rules(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, general) in self.rules.iter().enumerate() {
            for (j, specific) in self.rules.iter().enumerate() {
                if i != j && general.compatible(specific) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// The model with all context removed from rules and initial state.
    ///
    /// Rules that become identity rewrites are dropped. Labels do not
    /// survive the reduction, so neither does the regulation.
    pub fn reduce_context(&self) -> Result<Model, ModelError> {
        let mut rules: Vec<Rule> = Vec::new();
        for rule in &self.rules {
            let reduced = rule.reduce_context();
            if reduced.is_meaningful() && !rules.contains(&reduced) {
                rules.push(reduced);
            }
        }
        let init: Multiset = self
            .init
            .iter()
            .map(|(complex, n)| (complex.reduce_context(), n))
            .collect();
        Model::new(rules, init, self.definitions.clone(), self.params.clone(), None)
    }

    /// Network-free stochastic simulation up to `max_time`.
    pub fn simulate<R: Rng + ?Sized>(&self, max_time: f64, rng: &mut R) -> Trajectory {
        simulation::simulate(
            &self.rules,
            &self.init,
            &self.definitions,
            self.regulation.as_ref(),
            max_time,
            rng,
        )
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#! rules")?;
        for rule in &self.rules {
            writeln!(f, "{}", rule)?;
        }
        writeln!(f, "#! inits")?;
        for (complex, n) in self.init.iter() {
            writeln!(f, "{} {}", n, complex)?;
        }
        if !self.definitions.is_empty() {
            writeln!(f, "#! definitions")?;
            for (name, value) in &self.definitions {
                writeln!(f, "{} = {}", name, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulation::Ordered;

    fn rules(texts: &[&str]) -> Vec<Rule> {
        texts.iter().map(|t| t.parse().unwrap()).collect()
    }

    fn init(entries: &[(&str, u32)]) -> Multiset {
        entries
            .iter()
            .map(|(c, n)| (c.parse::<Complex>().unwrap(), *n))
            .collect()
    }

    fn model(texts: &[&str], start: &[(&str, u32)]) -> Model {
        Model::new(rules(texts), init(start), Definitions::new(), BTreeSet::new(), None).unwrap()
    }

    #[test]
    fn missing_rates_default_to_one() {
        let m = model(&["X()::rep => "], &[("X()::rep", 1)]);
        assert!(!m.all_rates());
        assert_eq!(m.rules()[0].rate().map(|r| r.to_string()), Some("1".to_string()));
    }

    #[test]
    fn regulation_labels_are_checked() {
        let order = Ordered::new([("a".to_string(), "missing".to_string())]);
        let err = Model::new(
            rules(&["a ~ X()::rep => "]),
            Multiset::new(),
            Definitions::new(),
            BTreeSet::new(),
            Some(order.into()),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Regulation(RegulationError::UnknownLabel { .. })));
    }

    #[test]
    fn bound_covers_rules_and_init() {
        let m = model(&["X()::rep => 3 Y()::rep"], &[("X()::rep", 2)]);
        assert_eq!(m.compute_bound(), 3);
        let m = model(&["X()::rep => Y()::rep"], &[("X()::rep", 5)]);
        assert_eq!(m.compute_bound(), 5);
    }

    #[test]
    fn ordering_contains_every_concrete_complex() {
        let m = model(&["K{_}::c => K{p}::c"], &[("K{u}::c", 1)]);
        let ordering: Vec<String> = m.create_ordering().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(ordering, vec!["K{p}::c".to_string(), "K{u}::c".to_string()]);
        assert_eq!(m.reactions().unwrap().len(), 2);
    }

    #[test]
    fn static_analysis() {
        let m = model(&["A{i}::c => B{i}::c"], &[("A{i}::c", 1)]);
        assert!(!m.static_non_reachability(&"B{_}::c".parse().unwrap()));
        assert!(!m.static_non_reachability(&"A{i}::c".parse().unwrap()));
        assert!(m.static_non_reachability(&"C{i}::c".parse().unwrap()));

        let m = model(&["A{_}::c => B{_}::c", "A{i}::c => B{i}::c"], &[]);
        assert_eq!(m.redundant_rules(), vec![(0, 1)]);
    }

    #[test]
    fn context_reduction_drops_identity_rules() {
        let m = model(
            &["K(s{u})::c => K(s{p})::c", "A{i}::c => B{i}::c"],
            &[("K(s{u})::c", 2)],
        );
        let reduced = m.reduce_context().unwrap();
        assert_eq!(reduced.rules().len(), 1);
        assert_eq!(reduced.init().count(&"K()::c".parse().unwrap()), 2);
    }

    #[test]
    fn display_lists_sections() {
        let m = model(&["r ~ X()::rep => @ 2"], &[("X()::rep", 2)]);
        let text = m.to_string();
        assert!(text.starts_with("#! rules\n"));
        assert!(text.contains("#! inits\n2 X()::rep\n"));
    }
}
