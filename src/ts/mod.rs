//! Transition systems over bounded multiset states.
//!
//! A [`TransitionSystem`] is grown from an initial state by repeatedly
//! expanding frontier states. Expansion is a pure function of a state and the
//! model, so exploration can run on several threads, stop at a limit, be
//! written to disk and resumed later without changing the final graph.

pub mod edge;
pub mod explicit;
pub mod persist;
pub mod state;
pub mod system;
pub mod transition;
pub(crate) mod worker;

pub use edge::Edge;
pub use persist::{PersistError, TsDocument};
pub use state::{Memory, MemoryLevel, State};
pub use system::TransitionSystem;
pub use transition::{Candidate, Firing, Transition};
pub use worker::Outcome;
