//! Atomic propositions over state counts.
//!
//! `[A{i}::cell] >= 2` holds in a state when the complexes compatible with
//! `A{i}::cell` occur at least twice. The complex may be abstract; it then
//! stands for every concrete complex of the state space it describes.

use crate::complex::Complex;
use crate::ts::State;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("complex {0} describes no complex of the state space")]
    ComplexOutOfScope(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Ge => ">=",
            Comparison::Gt => ">",
        }
    }

    #[inline]
    pub fn holds(self, lhs: u64, rhs: u64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Gt => lhs > rhs,
        }
    }

    /// Longest operator at the start of `text`, with its length.
    fn leading(text: &str) -> Option<(Comparison, usize)> {
        [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("!=", Comparison::Ne),
            ("==", Comparison::Eq),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
            ("=", Comparison::Eq),
        ]
        .into_iter()
        .find(|(symbol, _)| text.starts_with(symbol))
        .map(|(symbol, cmp)| (cmp, symbol.len()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtomicProposition {
    complex: Complex,
    comparison: Comparison,
    value: u64,
}

impl AtomicProposition {
    pub fn new(complex: Complex, comparison: Comparison, value: u64) -> Self {
        Self {
            complex,
            comparison,
            value,
        }
    }

    pub fn complex(&self) -> &Complex {
        &self.complex
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Whether the proposition holds in `state`. Nothing holds in hell.
    pub fn holds(&self, state: &State) -> bool {
        !state.is_hell()
            && self
                .comparison
                .holds(state.content().count_compatible(&self.complex), self.value)
    }

    /// Fails when the complex describes no entry of `ordering`.
    pub fn check_scope(&self, ordering: &[Complex]) -> Result<(), ScopeError> {
        if self.complex.identify_compatible(ordering).is_empty() {
            return Err(ScopeError::ComplexOutOfScope(self.complex.to_string()));
        }
        Ok(())
    }

    /// Every proposition written in `formula`, with the exact text it
    /// occupies there.
    pub fn find_in(formula: &str) -> Vec<(String, AtomicProposition)> {
        let mut found = Vec::new();
        for (start, _) in formula.match_indices('[') {
            if let Some((len, ap)) = Self::parse_prefix(&formula[start..]) {
                found.push((formula[start..start + len].to_string(), ap));
            }
        }
        found
    }

    /// Parses a proposition at the start of `text`, returning its length.
    fn parse_prefix(text: &str) -> Option<(usize, AtomicProposition)> {
        let close = text.find(']')?;
        let complex: Complex = text[1..close].trim().parse().ok()?;
        let rest = &text[close + 1..];
        let after_op = rest.trim_start();
        let (comparison, op_len) = Comparison::leading(after_op)?;
        let after_op = &after_op[op_len..];
        let digits = after_op.trim_start();
        let value_len = digits.chars().take_while(|c| c.is_ascii_digit()).count();
        if value_len == 0 {
            return None;
        }
        let value = digits[..value_len].parse().ok()?;
        let len = text.len() - digits.len() + value_len;
        Some((len, AtomicProposition::new(complex, comparison, value)))
    }
}

impl fmt::Display for AtomicProposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.complex, self.comparison.symbol(), self.value)
    }
}

impl FromStr for AtomicProposition {
    type Err = crate::complex::NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match Self::parse_prefix(s) {
            Some((len, ap)) if len == s.len() => Ok(ap),
            _ => Err(crate::complex::NotationError::MalformedAgent(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiset::Multiset;
    use crate::ts::Memory;

    fn state(entries: &[(&str, u32)]) -> State {
        let content: Multiset = entries
            .iter()
            .map(|(c, n)| (c.parse::<Complex>().unwrap(), *n))
            .collect();
        State::new(content, Memory::default())
    }

    #[test]
    fn counts_compatible_complexes() {
        let ap: AtomicProposition = "[A{_}::c] >= 3".parse().unwrap();
        assert!(ap.holds(&state(&[("A{i}::c", 2), ("A{a}::c", 1)])));
        assert!(!ap.holds(&state(&[("A{i}::c", 2)])));
        assert!(!ap.holds(&State::hell()));
        assert_eq!(ap.to_string(), "[A{_}::c] >= 3");
    }

    #[test]
    fn finds_propositions_inside_formulas() {
        let formula = "P=? [F [X()::rep]=0 & [Y{a}::c] < 2]";
        let found = AtomicProposition::find_in(formula);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "[X()::rep]=0");
        assert_eq!(found[0].1.comparison(), Comparison::Eq);
        assert_eq!(found[1].0, "[Y{a}::c] < 2");
        assert_eq!(found[1].1.value(), 2);
    }

    #[test]
    fn scope_requires_a_compatible_entry() {
        let ordering: Vec<Complex> = vec!["A{i}::c".parse().unwrap()];
        let inside: AtomicProposition = "[A{_}::c] > 0".parse().unwrap();
        assert!(inside.check_scope(&ordering).is_ok());
        let outside: AtomicProposition = "[B{_}::c] > 0".parse().unwrap();
        assert_eq!(
            outside.check_scope(&ordering),
            Err(ScopeError::ComplexOutOfScope("B{_}::c".into()))
        );
    }
}
