//! Count maps over complexes.
//!
//! A `Multiset` never stores a zero count, so structural equality coincides
//! with multiset equality.

use crate::complex::Complex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Multiset of complexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Multiset(BTreeMap<Complex, u32>);

impl Multiset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts the given complexes.
    pub fn from_complexes<'a>(complexes: impl IntoIterator<Item = &'a Complex>) -> Self {
        let mut multiset = Self::new();
        for complex in complexes {
            multiset.insert(complex.clone(), 1);
        }
        multiset
    }

    /// Adds `count` copies of a complex.
    pub fn insert(&mut self, complex: Complex, count: u32) {
        if count > 0 {
            *self.0.entry(complex).or_insert(0) += count;
        }
    }

    pub fn count(&self, complex: &Complex) -> u32 {
        self.0.get(complex).copied().unwrap_or(0)
    }

    /// Number of distinct complexes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.0.values().map(|&n| n as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Complex, u32)> {
        self.0.iter().map(|(c, &n)| (c, n))
    }

    /// Distinct complexes in canonical order.
    pub fn complexes(&self) -> impl Iterator<Item = &Complex> {
        self.0.keys()
    }

    /// Every occurrence, repeated by count.
    pub fn elements(&self) -> impl Iterator<Item = &Complex> {
        self.0
            .iter()
            .flat_map(|(c, &n)| std::iter::repeat(c).take(n as usize))
    }

    /// Whether `other` is a sub-multiset of `self`.
    pub fn contains(&self, other: &Multiset) -> bool {
        other.0.iter().all(|(c, &n)| self.count(c) >= n)
    }

    /// `self - other`, or `None` when `other` is not contained.
    pub fn checked_sub(&self, other: &Multiset) -> Option<Multiset> {
        let mut result = self.clone();
        for (complex, &n) in &other.0 {
            let slot = result.0.get_mut(complex)?;
            if *slot < n {
                return None;
            }
            *slot -= n;
            if *slot == 0 {
                result.0.remove(complex);
            }
        }
        Some(result)
    }

    /// Removes as many copies as present, saturating at zero.
    pub fn saturating_sub(&self, other: &Multiset) -> Multiset {
        let mut result = self.clone();
        for (complex, &n) in &other.0 {
            if let Some(slot) = result.0.get_mut(complex) {
                *slot = slot.saturating_sub(n);
                if *slot == 0 {
                    result.0.remove(complex);
                }
            }
        }
        result
    }

    pub fn add(&self, other: &Multiset) -> Multiset {
        let mut result = self.clone();
        for (complex, &n) in &other.0 {
            result.insert(complex.clone(), n);
        }
        result
    }

    /// True if some count exceeds `bound`.
    pub fn exceeds(&self, bound: u32) -> bool {
        self.0.values().any(|&n| n > bound)
    }

    pub fn max_count(&self) -> u32 {
        self.0.values().copied().max().unwrap_or(0)
    }

    /// Whether any of the given complexes is present.
    pub fn intersects(&self, complexes: &BTreeSet<Complex>) -> bool {
        complexes.iter().any(|c| self.0.contains_key(c))
    }

    /// Sum of counts of complexes the pattern is compatible with.
    pub fn count_compatible(&self, pattern: &Complex) -> u64 {
        self.0
            .iter()
            .filter(|(c, _)| pattern.compatible(c))
            .map(|(_, &n)| n as u64)
            .sum()
    }

    /// Counts laid out along `ordering`. Complexes outside the ordering are dropped.
    pub fn to_vector(&self, ordering: &[Complex]) -> Vec<u32> {
        ordering.iter().map(|c| self.count(c)).collect()
    }

    pub fn from_vector(ordering: &[Complex], values: &[u32]) -> Multiset {
        let mut multiset = Multiset::new();
        for (complex, &n) in ordering.iter().zip(values) {
            multiset.insert(complex.clone(), n);
        }
        multiset
    }
}

impl FromIterator<(Complex, u32)> for Multiset {
    fn from_iter<I: IntoIterator<Item = (Complex, u32)>>(iter: I) -> Self {
        let mut multiset = Multiset::new();
        for (complex, n) in iter {
            multiset.insert(complex, n);
        }
        multiset
    }
}

impl fmt::Display for Multiset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (complex, n)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", n, complex)?;
        }
        write!(f, "}}")
    }
}

/// Complexes serialize as their canonical text.
impl Serialize for Multiset {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (complex, n) in &self.0 {
            map.serialize_entry(&complex.to_string(), n)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Multiset {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, u32>::deserialize(deserializer)?;
        let mut multiset = Multiset::new();
        for (text, n) in raw {
            let complex: Complex = text.parse().map_err(serde::de::Error::custom)?;
            multiset.insert(complex, n);
        }
        Ok(multiset)
    }
}
