//! Weighted, labelled edges between state slots.

/// A probabilistic transition between two states of a [`TransitionSystem`].
///
/// Endpoints are slot indices into the owning system; see
/// [`TransitionSystem::state`].
///
/// [`TransitionSystem`]: super::TransitionSystem
/// [`TransitionSystem::state`]: super::TransitionSystem::state
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    source: usize,
    target: usize,
    probability: f64,
    label: Option<String>,
}

impl Edge {
    pub fn new(source: usize, target: usize, probability: f64, label: Option<String>) -> Self {
        Self {
            source,
            target,
            probability,
            label,
        }
    }

    #[inline]
    pub fn source(&self) -> usize {
        self.source
    }

    #[inline]
    pub fn target(&self) -> usize {
        self.target
    }

    #[inline]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}
