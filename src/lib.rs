//! Rulespace: rule-based biochemical reaction networks and their bounded
//! state spaces.
//!
//! Models are written as rewrite rules over complexes of agents, in the
//! style of BCSL:
//!
//! ```text
//! r1 ~ K(S{u},T{i})::cyt => K(S{p},T{i})::cyt @ k1*[K(S{u},T{i})::cyt]
//! ```
//!
//! Rules may leave context unspecified: a `_` state, or an atomic missing
//! from a structure, stands for every value the model's signatures allow.
//! The crate provides:
//! - context completion of rules into ground reactions, and direct matching
//!   of rules against concrete states;
//! - regulations restricting the order in which rules may fire;
//! - concurrent, bounded state-space generation into a discrete-time
//!   transition system, with time and size limits and resumable checkpoints;
//! - persistence, explicit export for probabilistic model checkers, and
//!   network-free stochastic simulation.
//!
//! # References
//!
//! - Troják et al. "Biochemical Space Language in relation to multiset
//!   rewriting systems" (2019)
//! - Gillespie, D. T. "Exact stochastic simulation of coupled chemical
//!   reactions" (1977)
//! - Danos, Feret, Fontana, Krivine. "Scalable simulation of cellular
//!   signaling networks" (2007), network-free simulation
//!
//! # Example
//!
//! ```
//! use rulespace::prelude::*;
//! use std::collections::BTreeSet;
//!
//! let rules: Vec<Rule> = vec!["deg ~ X()::rep => @ k*[X()::rep]".parse()?];
//! let x: Complex = "X()::rep".parse()?;
//! let init: Multiset = [(x, 2)].into_iter().collect();
//! let definitions = Definitions::from([("k".to_string(), 0.5)]);
//! let model = Model::new(rules, init, definitions, BTreeSet::new(), None)?;
//!
//! let generation = model.generate_transition_system(&GenerationConfig::default())?;
//! assert_eq!(generation.outcome, Outcome::Complete);
//! assert_eq!(generation.ts.len(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod agent;
pub mod checker;
pub mod complex;
pub mod config;
pub mod fingerprint;
pub mod model;
pub mod multiset;
pub mod proposition;
pub mod rate;
pub mod reaction;
pub mod regulation;
pub mod rule;
pub mod side;
pub mod signature;
pub mod simulation;
pub mod ts;

pub use agent::{Agent, AgentError, AtomicAgent, StructureAgent};
pub use complex::{Complex, NotationError};
pub use model::{Generation, Model, ModelError};
pub use multiset::Multiset;
pub use rule::{Rule, RuleError};
pub use ts::{State, TransitionSystem};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::agent::{Agent, AgentError, AtomicAgent, StructureAgent};
    pub use crate::checker::{CheckerError, ModelChecker};
    pub use crate::complex::{Complex, NotationError};
    pub use crate::config::{ConfigError, GenerationConfig, GenerationMode};
    pub use crate::fingerprint::{ts_fingerprint, HashValue};
    pub use crate::model::{Generation, Model, ModelError};
    pub use crate::multiset::Multiset;
    pub use crate::proposition::{AtomicProposition, Comparison, ScopeError};
    pub use crate::rate::{Definitions, Rate, RateError};
    pub use crate::reaction::Reaction;
    pub use crate::regulation::{
        ConcurrentFree, Conditional, Ordered, Programmed, Regular, Regulation, RegulationError,
    };
    pub use crate::rule::{Rule, RuleError};
    pub use crate::side::Side;
    pub use crate::signature::{SignatureError, Signatures};
    pub use crate::simulation::Trajectory;
    pub use crate::ts::{Edge, Memory, MemoryLevel, Outcome, PersistError, State, TransitionSystem};
}
