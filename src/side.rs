//! One side of a reaction: an ordered list of complexes with a multiset view.

use crate::complex::{split_top_level, Complex, NotationError};
use crate::multiset::Multiset;
use crate::signature::{SignatureError, Signatures};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Reactants or products of a reaction.
///
/// Order matters for positional compatibility; equality and hashing only
/// see the multiset.
#[derive(Debug, Clone, Default)]
pub struct Side {
    complexes: Vec<Complex>,
}

impl Side {
    pub fn new(complexes: Vec<Complex>) -> Self {
        Self { complexes }
    }

    pub fn complexes(&self) -> &[Complex] {
        &self.complexes
    }

    pub fn len(&self) -> usize {
        self.complexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.complexes.is_empty()
    }

    pub fn to_multiset(&self) -> Multiset {
        Multiset::from_complexes(&self.complexes)
    }

    /// Counts along an ordering.
    pub fn to_vector(&self, ordering: &[Complex]) -> Vec<u32> {
        self.to_multiset().to_vector(ordering)
    }

    /// Largest stoichiometric coefficient on this side.
    pub fn most_frequent(&self) -> u32 {
        self.to_multiset().max_count()
    }

    /// Position-wise compatibility over this side's length.
    pub fn compatible(&self, other: &Side) -> bool {
        self.len() <= other.len()
            && self
                .complexes
                .iter()
                .zip(&other.complexes)
                .all(|(pattern, candidate)| pattern.compatible(candidate))
    }

    /// Whether some complex of this side describes the given one.
    pub fn exists_compatible_agent(&self, complex: &Complex) -> bool {
        self.complexes.iter().any(|c| c.compatible(complex))
    }

    /// Every fully specified complex denoted by any complex of the side.
    pub fn create_all_compatible(
        &self,
        signatures: &Signatures,
    ) -> Result<BTreeSet<Complex>, SignatureError> {
        let mut all = BTreeSet::new();
        for complex in &self.complexes {
            all.extend(complex.create_all_compatible(signatures)?);
        }
        Ok(all)
    }
}

impl PartialEq for Side {
    fn eq(&self, other: &Self) -> bool {
        self.to_multiset() == other.to_multiset()
    }
}

impl Eq for Side {}

impl Hash for Side {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_multiset().hash(state);
    }
}

impl PartialOrd for Side {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Side {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_multiset().cmp(&other.to_multiset())
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (complex, n)) in self.to_multiset().iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{} {}", n, complex)?;
        }
        Ok(())
    }
}

/// Parses `2 X()::rep + A{i}::cell`; an empty string is the empty side.
impl FromStr for Side {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut complexes = Vec::new();
        for term in split_terms(s)? {
            complexes.push(term.parse()?);
        }
        Ok(Side::new(complexes))
    }
}

/// Splits side notation into one complex text per occurrence.
///
/// A leading integer coefficient repeats the complex that follows it.
pub(crate) fn split_terms(text: &str) -> Result<Vec<&str>, NotationError> {
    let mut terms = Vec::new();
    if text.trim().is_empty() {
        return Ok(terms);
    }
    for term in split_top_level(text, '+') {
        let term = term.trim();
        let (count, complex) = match term.split_once(char::is_whitespace) {
            Some((head, rest)) if head.chars().all(|c| c.is_ascii_digit()) => {
                let n: usize = head
                    .parse()
                    .map_err(|_| NotationError::MalformedCount(term.to_string()))?;
                (n, rest.trim())
            }
            _ => (1, term),
        };
        if count == 0 {
            return Err(NotationError::MalformedCount(term.to_string()));
        }
        terms.extend(std::iter::repeat(complex).take(count));
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stoichiometry() {
        let side: Side = "2 X()::rep + A{i}::cell".parse().unwrap();
        assert_eq!(side.len(), 3);
        assert_eq!(side.most_frequent(), 2);
        assert_eq!(side.to_string(), "1 A{i}::cell + 2 X()::rep");
        assert!("".parse::<Side>().unwrap().is_empty());
        assert!("0 X()::rep".parse::<Side>().is_err());
    }

    #[test]
    fn equality_ignores_order() {
        let a: Side = "X()::rep + Y()::rep".parse().unwrap();
        let b: Side = "Y()::rep + X()::rep".parse().unwrap();
        assert_eq!(a, b);
        assert!(!a.compatible(&b));
    }

    #[test]
    fn positional_compatibility() {
        let pattern: Side = "A{_}::c".parse().unwrap();
        let concrete: Side = "A{i}::c + B{i}::c".parse().unwrap();
        assert!(pattern.compatible(&concrete));
        assert!(!concrete.compatible(&pattern));
        assert!(concrete.exists_compatible_agent(&"B{i}::c".parse().unwrap()));
    }
}
