//! Regular regulation: firing sequences confined to a regular language.
//!
//! The concatenated labels of the history followed by a candidate's label
//! must be a prefix of some word of the language. The pattern is compiled to
//! a minimal DFA once; the states from which an accepting end of input is
//! still reachable are computed up front, so checking a prefix is a walk
//! over its bytes followed by a set lookup.

use super::{Policy, RegulationError};
use crate::ts::{Candidate, MemoryLevel, State};
use regex_automata::dfa::{dense, Automaton, StartKind};
use regex_automata::util::primitives::StateID;
use regex_automata::{Anchored, Input, MatchKind};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

const METACHARACTERS: &str = ".*+?^${}()[]|\\";

#[derive(Debug, Clone)]
pub struct Regular {
    pattern: String,
    dfa: dense::DFA<Vec<u32>>,
    start: StateID,
    live: HashSet<StateID>,
}

impl Regular {
    pub fn new(pattern: &str) -> Result<Self, RegulationError> {
        let invalid = |reason: String| RegulationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        let dfa = dense::Builder::new()
            .configure(
                dense::DFA::config()
                    .match_kind(MatchKind::All)
                    .start_kind(StartKind::Anchored)
                    .minimize(true),
            )
            .build(pattern)
            .map_err(|e| invalid(e.to_string()))?;
        let start = dfa
            .start_state_forward(&Input::new("").anchored(Anchored::Yes))
            .map_err(|e| invalid(e.to_string()))?;
        let live = live_states(&dfa, start);
        Ok(Self {
            pattern: pattern.to_string(),
            dfa,
            start,
            live,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn advance(&self, from: StateID, bytes: &[u8]) -> Option<StateID> {
        let mut state = from;
        for &byte in bytes {
            state = self.dfa.next_state(state, byte);
            if !self.live.contains(&state) {
                return None;
            }
        }
        Some(state)
    }

    /// Whether `word` can still be extended into a word of the language.
    pub fn is_viable_prefix(&self, word: &str) -> bool {
        self.live.contains(&self.start) && self.advance(self.start, word.as_bytes()).is_some()
    }
}

/// States from which some continuation is accepted at end of input.
fn live_states(dfa: &dense::DFA<Vec<u32>>, start: StateID) -> HashSet<StateID> {
    let mut predecessors: HashMap<StateID, HashSet<StateID>> = HashMap::new();
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    let mut accepting = Vec::new();

    while let Some(state) = queue.pop_front() {
        if dfa.is_match_state(dfa.next_eoi_state(state)) {
            accepting.push(state);
        }
        for byte in 0..=u8::MAX {
            let next = dfa.next_state(state, byte);
            if dfa.is_dead_state(next) {
                continue;
            }
            predecessors.entry(next).or_default().insert(state);
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let mut live: HashSet<StateID> = accepting.iter().copied().collect();
    let mut queue: VecDeque<StateID> = accepting.into_iter().collect();
    while let Some(state) = queue.pop_front() {
        for &previous in predecessors.get(&state).into_iter().flatten() {
            if live.insert(previous) {
                queue.push_back(previous);
            }
        }
    }
    live
}

impl Policy for Regular {
    const NAME: &'static str = "regular";

    fn memory(&self) -> MemoryLevel {
        MemoryLevel::Full
    }

    fn filter<'a>(&self, state: &State, candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
        let path: String = state
            .memory()
            .history()
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        let Some(after_path) = self
            .live
            .contains(&self.start)
            .then(|| self.advance(self.start, path.as_bytes()))
            .flatten()
        else {
            return Vec::new();
        };
        candidates
            .into_iter()
            .filter(|c| {
                self.advance(after_path, c.label.unwrap_or_default().as_bytes())
                    .is_some()
            })
            .collect()
    }

    fn referenced_labels(&self) -> BTreeSet<&str> {
        BTreeSet::new()
    }

    /// Every character of the pattern that is not regex syntax must be part
    /// of an occurrence of some model label.
    fn check_labels(&self, labels: &BTreeSet<String>) -> Result<(), RegulationError> {
        let mut covered = vec![false; self.pattern.len()];
        for label in labels.iter().filter(|l| !l.is_empty()) {
            for (start, _) in self.pattern.match_indices(label.as_str()) {
                covered[start..start + label.len()].fill(true);
            }
        }
        let mut depth = 0usize;
        for (position, c) in self.pattern.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            let syntax = METACHARACTERS.contains(c) || c.is_whitespace() || depth > 0;
            if !syntax && !covered[position] {
                return Err(RegulationError::UncoveredPattern {
                    pattern: self.pattern.clone(),
                    position,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulation::test_support::{after, candidate, labels_of};

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefixes_of_the_language_are_viable() {
        let regular = Regular::new("(ab)*c").unwrap();
        assert!(regular.is_viable_prefix(""));
        assert!(regular.is_viable_prefix("a"));
        assert!(regular.is_viable_prefix("abab"));
        assert!(regular.is_viable_prefix("ababc"));
        assert!(!regular.is_viable_prefix("aa"));
        assert!(!regular.is_viable_prefix("abcc"));
        assert!(!regular.is_viable_prefix("cab"));
    }

    #[test]
    fn completed_words_do_not_extend() {
        let regular = Regular::new("ab|abc").unwrap();
        assert!(regular.is_viable_prefix("ab"));
        assert!(regular.is_viable_prefix("abc"));
        assert!(!regular.is_viable_prefix("abd"));
        assert!(!regular.is_viable_prefix("abcd"));
    }

    #[test]
    fn filters_by_history() {
        let regular = Regular::new("(ab)*c").unwrap();
        let all = || vec![candidate("a"), candidate("b"), candidate("c")];
        assert_eq!(labels_of(&regular.filter(&after(MemoryLevel::Full, &[]), all())), ["a", "c"]);
        assert_eq!(labels_of(&regular.filter(&after(MemoryLevel::Full, &["a"]), all())), ["b"]);
        assert_eq!(labels_of(&regular.filter(&after(MemoryLevel::Full, &["a", "b", "c"]), all())).len(), 0);
    }

    #[test]
    fn pattern_must_be_covered_by_labels() {
        let regular = Regular::new("(r1|r2)*r3{2}").unwrap();
        assert!(regular.check_labels(&labels(&["r1", "r2", "r3"])).is_ok());
        assert_eq!(
            regular.check_labels(&labels(&["r1", "r2"])),
            Err(RegulationError::UncoveredPattern {
                pattern: "(r1|r2)*r3{2}".into(),
                position: 8
            })
        );
    }

    #[test]
    fn invalid_patterns_are_reported() {
        assert!(matches!(
            Regular::new("(ab"),
            Err(RegulationError::InvalidPattern { .. })
        ));
    }
}
