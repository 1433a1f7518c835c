//! Concurrent exploration.
//!
//! A fixed set of scoped worker threads shares one lock around the
//! transition system. A worker takes a frontier state, expands it with the
//! lock released, then records the successors. The calling thread acts as
//! controller: it enforces the time and size limits and raises or lowers
//! the number of active workers with the frontier size. Expansion of a
//! state is never interrupted, so stopping leaves every state either fully
//! expanded or still on the frontier.

use super::state::State;
use super::system::TransitionSystem;
use super::transition::{candidates, Transition};
use crate::config::GenerationConfig;
use crate::rate::Definitions;
use crate::regulation::Regulation;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::fmt;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Why exploration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No frontier states remain.
    Complete,
    /// The wall-clock budget ran out.
    TimeLimit,
    /// The state-count limit was passed.
    SizeLimit,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Complete => "complete",
            Outcome::TimeLimit => "time limit",
            Outcome::SizeLimit => "size limit",
        })
    }
}

/// Computes the successor distribution of a single state.
pub(crate) struct Expander<'a, T> {
    pub transitions: &'a [T],
    pub definitions: &'a Definitions,
    pub regulation: Option<&'a Regulation>,
    pub bound: u32,
}

impl<T: Transition> Expander<'_, T> {
    /// Successors with their probabilities.
    ///
    /// Firings leading to the same successor are merged, adding their rates
    /// and keeping the first label. A state without any enabled transition,
    /// and the hell state, loop to themselves with probability 1.
    pub fn expand(&self, state: &State) -> Vec<(State, f64, Option<String>)> {
        if state.is_hell() {
            return vec![(state.clone(), 1.0, None)];
        }
        let mut enabled = candidates(self.transitions, state.content(), self.definitions);
        if let Some(regulation) = self.regulation {
            enabled = regulation.filter(state, enabled);
        }

        let mut merged: BTreeMap<State, (f64, Option<&str>)> = BTreeMap::new();
        for candidate in &enabled {
            for firing in &candidate.firings {
                let next = state.update(firing, candidate.label, self.bound);
                merged
                    .entry(next)
                    .and_modify(|(rate, _)| *rate += candidate.rate)
                    .or_insert((candidate.rate, candidate.label));
            }
        }
        if merged.is_empty() {
            return vec![(state.clone(), 1.0, None)];
        }

        let total: f64 = merged.values().map(|(rate, _)| rate).sum();
        merged
            .into_iter()
            .map(|(next, (rate, label))| (next, rate / total, label.map(str::to_string)))
            .collect()
    }
}

struct Shared {
    ts: TransitionSystem,
    active: usize,
    in_flight: usize,
    stop: bool,
}

impl Shared {
    fn drained(&self) -> bool {
        self.ts.frontier_len() == 0 && self.in_flight == 0
    }
}

struct Pool {
    shared: Mutex<Shared>,
    work: Condvar,
    progress: Condvar,
}

/// Explores `ts` until it is complete or a limit of `config` is reached.
pub(crate) fn explore<T: Transition>(
    ts: TransitionSystem,
    expander: &Expander<'_, T>,
    config: &GenerationConfig,
) -> (TransitionSystem, Outcome) {
    let threads = config.threads.max(1);
    let started = Instant::now();
    let known = ts.len();
    let pool = Pool {
        shared: Mutex::new(Shared {
            ts,
            active: 1,
            in_flight: 0,
            stop: false,
        }),
        work: Condvar::new(),
        progress: Condvar::new(),
    };

    let outcome = thread::scope(|scope| {
        for id in 0..threads {
            let pool = &pool;
            scope.spawn(move || run_worker(id, pool, expander));
        }
        let outcome = control(&pool, config, started);
        pool.shared.lock().stop = true;
        pool.work.notify_all();
        outcome
    });

    let ts = pool.shared.into_inner().ts;
    info!(
        %outcome,
        states = ts.len(),
        discovered = ts.len().saturating_sub(known),
        edges = ts.edge_count(),
        frontier = ts.frontier_len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "exploration finished"
    );
    (ts, outcome)
}

fn control(pool: &Pool, config: &GenerationConfig, started: Instant) -> Outcome {
    let mut shared = pool.shared.lock();
    loop {
        if shared.drained() {
            return Outcome::Complete;
        }
        if config.max_time().is_some_and(|limit| started.elapsed() >= limit) {
            return Outcome::TimeLimit;
        }
        if config.max_size.is_some_and(|max| shared.ts.len() > max) {
            return Outcome::SizeLimit;
        }

        let desired = config.desired_workers(shared.ts.frontier_len());
        if desired != shared.active {
            debug!(
                from = shared.active,
                to = desired,
                frontier = shared.ts.frontier_len(),
                "rescaling workers"
            );
            shared.active = desired;
            pool.work.notify_all();
        }
        pool.progress.wait_for(&mut shared, config.poll_interval());
    }
}

fn run_worker<T: Transition>(id: usize, pool: &Pool, expander: &Expander<'_, T>) {
    let mut shared = pool.shared.lock();
    loop {
        if shared.stop {
            return;
        }
        let next = if id < shared.active {
            shared.ts.pop_frontier()
        } else {
            None
        };
        let Some((slot, state)) = next else {
            pool.work.wait(&mut shared);
            continue;
        };

        shared.in_flight += 1;
        let successors = MutexGuard::unlocked(&mut shared, || expander.expand(&state));
        let discovered = shared.ts.record_expansion(slot, successors);
        shared.in_flight -= 1;
        trace!(worker = id, slot, discovered, "state expanded");

        if discovered > 0 {
            pool.work.notify_all();
        } else if shared.drained() {
            pool.progress.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiset::Multiset;
    use crate::rule::Rule;
    use crate::ts::state::Memory;

    fn start(text: &str, n: u32) -> State {
        let content: Multiset = [(text.parse().unwrap(), n)].into_iter().collect();
        State::new(content, Memory::default())
    }

    fn rules(texts: &[&str]) -> Vec<Rule> {
        texts.iter().map(|t| t.parse().unwrap()).collect()
    }

    #[test]
    fn merges_firings_into_one_edge_per_target() {
        let rules = rules(&["a ~ X()::rep => @ 1", "b ~ X()::rep => @ 3"]);
        let defs = Definitions::new();
        let expander = Expander {
            transitions: &rules,
            definitions: &defs,
            regulation: None,
            bound: 5,
        };
        let successors = expander.expand(&start("X()::rep", 2));
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].1, 1.0);
        assert_eq!(successors[0].2.as_deref(), Some("a"));
    }

    #[test]
    fn deadlock_and_hell_loop() {
        let rules = rules(&["X()::rep => "]);
        let defs = Definitions::new();
        let expander = Expander {
            transitions: &rules,
            definitions: &defs,
            regulation: None,
            bound: 5,
        };
        let empty = State::new(Multiset::new(), Memory::default());
        assert_eq!(expander.expand(&empty), vec![(empty.clone(), 1.0, None)]);
        assert_eq!(expander.expand(&State::hell()), vec![(State::hell(), 1.0, None)]);
    }

    #[test]
    fn parallel_exploration_matches_sequential() {
        let rules = rules(&[
            "X()::rep => 2 X()::rep @ 2",
            "X()::rep => @ 1",
            "=> Y()::rep @ 0.5",
            "Y()::rep + X()::rep => @ 1",
        ]);
        let defs = Definitions::new();
        let expander = Expander {
            transitions: &rules,
            definitions: &defs,
            regulation: None,
            bound: 4,
        };
        let init = start("X()::rep", 1);
        let run = |threads: usize| {
            let config = GenerationConfig {
                states_per_worker: 1,
                ..GenerationConfig::default().with_threads(threads)
            };
            let (ts, outcome) = explore(TransitionSystem::new(init.clone(), 4), &expander, &config);
            assert_eq!(outcome, Outcome::Complete);
            crate::fingerprint::ts_fingerprint(&ts)
        };
        assert_eq!(run(1), run(4));
    }

    #[test]
    fn size_limit_leaves_a_frontier() {
        let rules = rules(&["=> X()::rep @ 1"]);
        let defs = Definitions::new();
        let expander = Expander {
            transitions: &rules,
            definitions: &defs,
            regulation: None,
            bound: u32::MAX,
        };
        let config = GenerationConfig::default().with_threads(2).with_max_size(10);
        let init = State::new(Multiset::new(), Memory::default());
        let (ts, outcome) = explore(TransitionSystem::new(init, u32::MAX), &expander, &config);
        assert_eq!(outcome, Outcome::SizeLimit);
        assert!(ts.len() > 10);
        assert!(!ts.is_complete());
        for slot in 0..ts.len() {
            let out: f64 = ts.outgoing(slot).map(|e| e.probability()).sum();
            if ts.is_processed(slot) {
                assert!((out - 1.0).abs() < 1e-12);
            } else {
                assert_eq!(out, 0.0);
            }
        }
    }

    #[test]
    fn time_limit_checkpoint_resumes() {
        let rules = rules(&["=> X()::rep @ 1"]);
        let defs = Definitions::new();
        let expander = Expander {
            transitions: &rules,
            definitions: &defs,
            regulation: None,
            bound: u32::MAX,
        };
        let config = GenerationConfig::default()
            .with_threads(2)
            .with_max_time(std::time::Duration::from_millis(30));
        let init = State::new(Multiset::new(), Memory::default());
        let (ts, outcome) = explore(TransitionSystem::new(init, u32::MAX), &expander, &config);
        assert_eq!(outcome, Outcome::TimeLimit);
        assert!(!ts.is_complete());
        assert!(ts.frontier_len() > 0);
        for slot in (0..ts.len()).filter(|&s| ts.is_processed(s)) {
            let out: f64 = ts.outgoing(slot).map(|e| e.probability()).sum();
            assert_eq!(out, 1.0);
        }

        let checkpoint = TransitionSystem::from_json_str(&ts.to_json_string().unwrap()).unwrap();
        assert_eq!(checkpoint.len(), ts.len());
        assert_eq!(checkpoint.frontier_len(), ts.frontier_len());

        let known = checkpoint.len();
        let config = GenerationConfig::default().with_threads(2).with_max_size(known + 20);
        let (resumed, outcome) = explore(checkpoint, &expander, &config);
        assert_eq!(outcome, Outcome::SizeLimit);
        assert!(resumed.len() > known + 20);
        assert_eq!(resumed.init(), ts.init());
        for slot in (0..resumed.len()).filter(|&s| resumed.is_processed(s)) {
            let out: f64 = resumed.outgoing(slot).map(|e| e.probability()).sum();
            assert_eq!(out, 1.0);
        }
    }
}
