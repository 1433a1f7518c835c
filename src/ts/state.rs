//! States of the transition system.
//!
//! A state is a multiset of complexes plus the bounded firing history a
//! regulation needs. Every state whose content exceeds the bound collapses
//! into the single absorbing hell state.

use super::transition::Firing;
use crate::complex::Complex;
use crate::multiset::Multiset;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much firing history a state keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryLevel {
    /// No history.
    #[default]
    None,
    /// The last label only.
    Last,
    /// The whole sequence of labels.
    Full,
}

impl MemoryLevel {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::None),
            1 => Some(Self::Last),
            2 => Some(Self::Full),
            _ => None,
        }
    }

    #[inline]
    pub fn level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Last => 1,
            Self::Full => 2,
        }
    }
}

/// Firing history. Unlabelled firings are recorded as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Memory {
    level: MemoryLevel,
    history: Vec<Option<String>>,
}

impl Memory {
    pub fn new(level: MemoryLevel) -> Self {
        Self {
            level,
            history: Vec::new(),
        }
    }

    /// Restores a history; it is truncated to what the level keeps.
    pub fn with_history(level: MemoryLevel, mut history: Vec<Option<String>>) -> Self {
        match level {
            MemoryLevel::None => history.clear(),
            MemoryLevel::Last => {
                let keep = history.len().saturating_sub(1);
                history.drain(..keep);
            }
            MemoryLevel::Full => {}
        }
        Self { level, history }
    }

    #[inline]
    pub fn level(&self) -> MemoryLevel {
        self.level
    }

    #[inline]
    pub fn history(&self) -> &[Option<String>] {
        &self.history
    }

    /// The most recent firing, if any was recorded.
    pub fn last(&self) -> Option<Option<&str>> {
        self.history.last().map(|l| l.as_deref())
    }

    pub fn update(&self, label: Option<&str>) -> Memory {
        let history = match self.level {
            MemoryLevel::None => Vec::new(),
            MemoryLevel::Last => vec![label.map(str::to_string)],
            MemoryLevel::Full => {
                let mut history = self.history.clone();
                history.push(label.map(str::to_string));
                history
            }
        };
        Memory {
            level: self.level,
            history,
        }
    }
}

/// A point of the state space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State {
    hell: bool,
    content: Multiset,
    memory: Memory,
}

impl State {
    pub fn new(content: Multiset, memory: Memory) -> Self {
        Self {
            hell: false,
            content,
            memory,
        }
    }

    /// The absorbing state standing for everything beyond the bound.
    pub fn hell() -> Self {
        Self {
            hell: true,
            content: Multiset::new(),
            memory: Memory::default(),
        }
    }

    #[inline]
    pub fn is_hell(&self) -> bool {
        self.hell
    }

    #[inline]
    pub fn content(&self) -> &Multiset {
        &self.content
    }

    #[inline]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// The successor reached by `firing`.
    ///
    /// Content exceeding `bound` yields the hell state.
    pub fn update(&self, firing: &Firing, label: Option<&str>, bound: u32) -> State {
        let content = self
            .content
            .saturating_sub(&firing.consumed)
            .add(&firing.produced);
        if content.exceeds(bound) {
            return State::hell();
        }
        State {
            hell: false,
            content,
            memory: self.memory.update(label),
        }
    }

    /// Counts along `ordering`; `None` for the hell state.
    pub fn to_vector(&self, ordering: &[Complex]) -> Option<Vec<u32>> {
        (!self.hell).then(|| self.content.to_vector(ordering))
    }

    /// Text identifying the state independently of any ordering.
    pub(crate) fn canonical_key(&self) -> String {
        if self.hell {
            return "hell".to_string();
        }
        let mut key = self.content.to_string();
        for label in &self.memory.history {
            key.push('|');
            key.push_str(label.as_deref().unwrap_or(""));
        }
        key
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hell {
            return write!(f, "hell");
        }
        write!(f, "{}", self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multiset(entries: &[(&str, u32)]) -> Multiset {
        entries
            .iter()
            .map(|(c, n)| (c.parse::<Complex>().unwrap(), *n))
            .collect()
    }

    #[test]
    fn memory_levels() {
        let none = Memory::new(MemoryLevel::None).update(Some("a"));
        assert!(none.history().is_empty());

        let last = Memory::new(MemoryLevel::Last).update(Some("a")).update(Some("b"));
        assert_eq!(last.history(), &[Some("b".to_string())]);

        let full = Memory::new(MemoryLevel::Full).update(Some("a")).update(None);
        assert_eq!(full.history(), &[Some("a".to_string()), None]);
        assert_eq!(full.last(), Some(None));
    }

    #[test]
    fn exceeding_the_bound_is_hell() {
        let s = State::new(multiset(&[("X()::rep", 2)]), Memory::new(MemoryLevel::Last));
        let grow = Firing {
            consumed: Multiset::new(),
            produced: multiset(&[("X()::rep", 1)]),
        };
        let next = s.update(&grow, Some("g"), 3);
        assert_eq!(next.content(), &multiset(&[("X()::rep", 3)]));
        assert_eq!(next.memory().last(), Some(Some("g")));

        let beyond = next.update(&grow, Some("g"), 3);
        assert!(beyond.is_hell());
        assert_eq!(beyond, State::hell());
        assert_eq!(beyond.to_vector(&[]), None);
    }

    #[test]
    fn restored_history_is_truncated() {
        let history = vec![Some("a".to_string()), Some("b".to_string())];
        let memory = Memory::with_history(MemoryLevel::Last, history);
        assert_eq!(memory.history(), &[Some("b".to_string())]);
    }
}
