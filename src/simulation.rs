//! Network-free stochastic simulation.
//!
//! Gillespie's direct method applied to rules rather than reactions: at each
//! step every rule is matched against the current state, one match per rule
//! is drawn uniformly, a rule is chosen with probability proportional to its
//! rate and the time advances by an exponentially distributed step.

use crate::complex::Complex;
use crate::multiset::Multiset;
use crate::rate::Definitions;
use crate::regulation::Regulation;
use crate::rule::Rule;
use crate::ts::{Candidate, Firing, Memory, State};
use rand::Rng;
use std::collections::BTreeSet;
use tracing::debug;

/// One sampled point of a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub state: Multiset,
}

/// Time series produced by [`simulate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Every complex that occurred at some point, sorted.
    pub fn complexes(&self) -> Vec<Complex> {
        let all: BTreeSet<&Complex> = self
            .samples
            .iter()
            .flat_map(|s| s.state.complexes())
            .collect();
        all.into_iter().cloned().collect()
    }

    /// Count of `complex` over time.
    pub fn series(&self, complex: &Complex) -> Vec<(f64, u32)> {
        self.samples
            .iter()
            .map(|s| (s.time, s.state.count(complex)))
            .collect()
    }

    /// Rows of `time` followed by counts along [`complexes`](Self::complexes).
    pub fn to_table(&self) -> (Vec<Complex>, Vec<(f64, Vec<u32>)>) {
        let columns = self.complexes();
        let rows = self
            .samples
            .iter()
            .map(|s| (s.time, s.state.to_vector(&columns)))
            .collect();
        (columns, rows)
    }
}

/// Simulates from `init` until `max_time`.
///
/// When no rule can fire, time still advances at a random idle rate so the
/// trajectory reaches `max_time`.
pub fn simulate<R: Rng + ?Sized>(
    rules: &[Rule],
    init: &Multiset,
    definitions: &Definitions,
    regulation: Option<&Regulation>,
    max_time: f64,
    rng: &mut R,
) -> Trajectory {
    let memory = regulation.map(Regulation::memory).unwrap_or_default();
    let mut state = State::new(init.clone(), Memory::new(memory));
    let mut time = 0.0;
    let mut samples = vec![Sample {
        time,
        state: state.content().clone(),
    }];

    while time < max_time {
        let mut enabled: Vec<Candidate<'_>> = rules
            .iter()
            .filter_map(|rule| {
                let rate = rule
                    .evaluate_rate(state.content(), definitions)
                    .filter(|r| r.is_finite() && *r > 0.0)?;
                let matched = rule.match_random(state.content(), rng)?;
                Some(Candidate {
                    label: rule.label(),
                    rate,
                    firings: vec![Firing {
                        consumed: rule.reconstruct_complexes_from_match(&matched),
                        produced: rule.replace(&matched),
                    }],
                })
            })
            .collect();
        if let Some(regulation) = regulation {
            enabled = regulation.filter(&state, enabled);
        }

        let total: f64 = enabled.iter().map(|c| c.rate).sum();
        let step_rate = if enabled.is_empty() {
            rng.gen_range(0.5..0.9)
        } else {
            let threshold = total * rng.gen::<f64>();
            let mut cumulative = 0.0;
            let chosen = enabled
                .iter()
                .find(|c| {
                    cumulative += c.rate;
                    cumulative >= threshold
                })
                .or(enabled.last());
            if let Some(chosen) = chosen {
                state = state.update(&chosen.firings[0], chosen.label, u32::MAX);
            }
            total
        };

        time += -(1.0 - rng.gen::<f64>()).ln() / step_rate;
        samples.push(Sample {
            time,
            state: state.content().clone(),
        });
    }
    debug!(steps = samples.len() - 1, end = time, "simulation finished");
    Trajectory { samples }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn degradation_runs_down_to_zero() {
        let rules: Vec<Rule> = vec!["X()::rep => @ 5*[X()::rep]".parse().unwrap()];
        let x: Complex = "X()::rep".parse().unwrap();
        let init: Multiset = [(x.clone(), 3)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(11);
        let trajectory = simulate(&rules, &init, &Definitions::new(), None, 50.0, &mut rng);

        let series = trajectory.series(&x);
        assert_eq!(series[0], (0.0, 3));
        assert!(series.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(series.windows(2).all(|w| w[1].1 <= w[0].1));
        assert_eq!(series.last().map(|s| s.1), Some(0));
        assert!(trajectory.samples().last().unwrap().time >= 50.0);
    }

    #[test]
    fn table_columns_cover_all_complexes() {
        let rules: Vec<Rule> = vec!["X()::rep => Y()::rep @ 1".parse().unwrap()];
        let init: Multiset = [("X()::rep".parse().unwrap(), 1)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(3);
        let (columns, rows) = simulate(&rules, &init, &Definitions::new(), None, 5.0, &mut rng).to_table();
        assert_eq!(columns.len(), 2);
        assert_eq!(rows[0].1, vec![1, 0]);
        assert!(rows.iter().all(|(_, counts)| counts.iter().sum::<u32>() == 1));
    }
}
