//! The transition-system container.
//!
//! States live in slots in discovery order. Public numeric ids are a separate
//! layer: the initial state is always id 0, ids restored from a checkpoint are
//! kept, and the remaining states are numbered in canonical state order when
//! the system is encoded. Slot numbers are therefore an exploration detail,
//! while encoded ids do not depend on thread interleaving.

use super::edge::Edge;
use super::state::{MemoryLevel, State};
use crate::complex::Complex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TransitionSystem {
    states: Vec<Arc<State>>,
    index: HashMap<Arc<State>, usize>,
    ids: Vec<Option<usize>>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<usize>>,
    processed: Vec<bool>,
    frontier: VecDeque<usize>,
    init: usize,
    bound: u32,
    params: Vec<String>,
}

impl TransitionSystem {
    /// A system containing only `init`, unexplored.
    pub fn new(init: State, bound: u32) -> Self {
        let mut ts = Self::empty(bound);
        let (slot, _) = ts.intern(init);
        ts.ids[slot] = Some(0);
        ts.init = slot;
        ts.frontier.push_back(slot);
        ts
    }

    pub(crate) fn empty(bound: u32) -> Self {
        Self {
            states: Vec::new(),
            index: HashMap::new(),
            ids: Vec::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
            processed: Vec::new(),
            frontier: VecDeque::new(),
            init: 0,
            bound,
            params: Vec::new(),
        }
    }

    /// Number of known states, explored or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Whether every known state has been expanded.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.frontier.is_empty()
    }

    #[inline]
    pub fn bound(&self) -> u32 {
        self.bound
    }

    #[inline]
    pub fn init_slot(&self) -> usize {
        self.init
    }

    pub fn init(&self) -> &State {
        &self.states[self.init]
    }

    /// Memory level of the states, taken from the initial state.
    pub fn memory_level(&self) -> MemoryLevel {
        self.init().memory().level()
    }

    /// Free parameters the rates were left symbolic in.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn set_params(&mut self, params: impl IntoIterator<Item = String>) {
        self.params = params.into_iter().collect();
    }

    pub fn state(&self, slot: usize) -> Option<&State> {
        self.states.get(slot).map(|s| s.as_ref())
    }

    /// States in slot order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.iter().map(|s| s.as_ref())
    }

    pub fn slot_of(&self, state: &State) -> Option<usize> {
        self.index.get(state).copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn outgoing(&self, slot: usize) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(slot)
            .into_iter()
            .flatten()
            .map(|&e| &self.edges[e])
    }

    #[inline]
    pub fn is_processed(&self, slot: usize) -> bool {
        self.processed.get(slot).copied().unwrap_or(false)
    }

    /// Known states still awaiting expansion.
    pub fn unprocessed(&self) -> impl Iterator<Item = &State> {
        self.frontier.iter().map(|&slot| self.states[slot].as_ref())
    }

    pub fn hell_slot(&self) -> Option<usize> {
        self.slot_of(&State::hell())
    }

    /// Sorted distinct complexes over all non-hell states.
    pub fn ordering(&self) -> Vec<Complex> {
        let complexes: BTreeSet<&Complex> = self
            .states
            .iter()
            .filter(|s| !s.is_hell())
            .flat_map(|s| s.content().complexes())
            .collect();
        complexes.into_iter().cloned().collect()
    }

    /// The id already assigned to a slot, if any.
    pub fn id(&self, slot: usize) -> Option<usize> {
        self.ids.get(slot).copied().flatten()
    }

    /// Ids for every slot, numbering unassigned states after the largest
    /// assigned id in canonical state order.
    pub fn encoding(&self) -> Vec<usize> {
        let mut ids = self.ids.clone();
        let mut next = ids.iter().flatten().max().map_or(0, |&m| m + 1);
        let mut fresh: Vec<usize> = (0..ids.len()).filter(|&s| ids[s].is_none()).collect();
        fresh.sort_by(|&a, &b| self.states[a].cmp(&self.states[b]));
        for slot in fresh {
            ids[slot] = Some(next);
            next += 1;
        }
        ids.into_iter().flatten().collect()
    }

    /// Fixes the ids computed by [`encoding`](Self::encoding).
    pub fn encode(&mut self) {
        self.ids = self.encoding().into_iter().map(Some).collect();
    }

    /// Slot of `state`, adding it if unknown. The flag tells whether it was new.
    pub(crate) fn intern(&mut self, state: State) -> (usize, bool) {
        if let Some(&slot) = self.index.get(&state) {
            return (slot, false);
        }
        let slot = self.states.len();
        let state = Arc::new(state);
        self.index.insert(Arc::clone(&state), slot);
        self.states.push(state);
        self.ids.push(None);
        self.outgoing.push(Vec::new());
        self.processed.push(false);
        (slot, true)
    }

    pub(crate) fn assign_id(&mut self, slot: usize, id: usize) {
        self.ids[slot] = Some(id);
    }

    pub(crate) fn set_init(&mut self, slot: usize) {
        self.init = slot;
    }

    pub(crate) fn push_frontier(&mut self, slot: usize) {
        self.frontier.push_back(slot);
    }

    pub(crate) fn mark_processed(&mut self, slot: usize) {
        self.processed[slot] = true;
    }

    pub(crate) fn pop_frontier(&mut self) -> Option<(usize, Arc<State>)> {
        let slot = self.frontier.pop_front()?;
        Some((slot, Arc::clone(&self.states[slot])))
    }

    pub(crate) fn push_edge(&mut self, edge: Edge) {
        self.outgoing[edge.source()].push(self.edges.len());
        self.edges.push(edge);
    }

    /// Integrates the successors of an expanded slot and returns how many
    /// of them were new.
    pub(crate) fn record_expansion(
        &mut self,
        slot: usize,
        successors: Vec<(State, f64, Option<String>)>,
    ) -> usize {
        let mut discovered = 0;
        for (state, probability, label) in successors {
            let (target, new) = self.intern(state);
            if new {
                self.frontier.push_back(target);
                discovered += 1;
            }
            self.push_edge(Edge::new(slot, target, probability, label));
        }
        self.processed[slot] = true;
        discovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiset::Multiset;
    use crate::ts::state::Memory;

    fn state(text: &str, n: u32) -> State {
        let content: Multiset = [(text.parse().unwrap(), n)].into_iter().collect();
        State::new(content, Memory::default())
    }

    #[test]
    fn init_is_id_zero_and_pending() {
        let ts = TransitionSystem::new(state("X()::rep", 2), 5);
        assert_eq!(ts.len(), 1);
        assert_eq!(ts.id(ts.init_slot()), Some(0));
        assert!(!ts.is_complete());
        assert_eq!(ts.unprocessed().count(), 1);
    }

    #[test]
    fn encoding_is_canonical_after_init() {
        let mut a = TransitionSystem::new(state("X()::rep", 2), 5);
        let (slot, _) = a.pop_frontier().unwrap();
        a.record_expansion(
            slot,
            vec![
                (state("X()::rep", 1), 0.5, None),
                (state("X()::rep", 3), 0.5, None),
            ],
        );
        let mut b = TransitionSystem::new(state("X()::rep", 2), 5);
        let (slot, _) = b.pop_frontier().unwrap();
        b.record_expansion(
            slot,
            vec![
                (state("X()::rep", 3), 0.5, None),
                (state("X()::rep", 1), 0.5, None),
            ],
        );
        let ids_of = |ts: &TransitionSystem| {
            let encoding = ts.encoding();
            let mut pairs: Vec<(String, usize)> = ts
                .states()
                .map(|s| s.to_string())
                .zip(encoding)
                .collect();
            pairs.sort();
            pairs
        };
        assert_eq!(ids_of(&a), ids_of(&b));
        assert_eq!(a.frontier_len(), 2);
        assert!(a.is_processed(a.init_slot()));
    }

    #[test]
    fn existing_ids_are_kept() {
        let mut ts = TransitionSystem::new(state("X()::rep", 2), 5);
        let (slot, _) = ts.pop_frontier().unwrap();
        ts.record_expansion(slot, vec![(state("X()::rep", 1), 1.0, None)]);
        ts.encode();
        let first = ts.encoding();
        let (slot, _) = ts.pop_frontier().unwrap();
        ts.record_expansion(slot, vec![(state("X()::rep", 0), 1.0, None)]);
        let second = ts.encoding();
        assert_eq!(&second[..2], &first[..]);
        assert_eq!(second[2], 2);
    }
}
