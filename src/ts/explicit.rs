//! Export in the explicit `.tra` / `.lab` format read by probabilistic model
//! checkers.

use super::system::TransitionSystem;
use crate::proposition::AtomicProposition;
use std::io::{self, Write};

/// Label used for the `index`-th atomic proposition.
pub fn proposition_label(index: usize) -> String {
    format!("prop_{index}")
}

impl TransitionSystem {
    /// Writes the `dtmc` transition matrix, one `source target probability`
    /// line per edge, ordered by encoded ids.
    pub fn write_explicit_transitions<W: Write>(&self, mut out: W) -> io::Result<()> {
        let ids = self.encoding();
        let mut lines: Vec<(usize, usize, f64)> = self
            .edges()
            .iter()
            .map(|e| (ids[e.source()], ids[e.target()], e.probability()))
            .collect();
        lines.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        writeln!(out, "dtmc")?;
        for (source, target, probability) in lines {
            writeln!(out, "{source} {target} {probability}")?;
        }
        Ok(())
    }

    /// Writes the state labelling: `init` on the initial state and
    /// `prop_i` on every state where the `i`-th proposition holds.
    pub fn write_explicit_labels<W: Write>(
        &self,
        mut out: W,
        propositions: &[AtomicProposition],
    ) -> io::Result<()> {
        let ids = self.encoding();
        let names: Vec<String> = (0..propositions.len()).map(proposition_label).collect();

        writeln!(out, "#DECLARATION")?;
        let mut declaration = vec!["init".to_string()];
        declaration.extend(names.iter().cloned());
        writeln!(out, "{}", declaration.join(" "))?;
        writeln!(out, "#END")?;

        let mut rows: Vec<(usize, Vec<&str>)> = Vec::new();
        for (slot, state) in self.states().enumerate() {
            let mut labels = Vec::new();
            if slot == self.init_slot() {
                labels.push("init");
            }
            for (ap, name) in propositions.iter().zip(&names) {
                if ap.holds(state) {
                    labels.push(name.as_str());
                }
            }
            if !labels.is_empty() {
                rows.push((ids[slot], labels));
            }
        }
        rows.sort_by_key(|(id, _)| *id);
        for (id, labels) in rows {
            writeln!(out, "{id} {}", labels.join(" "))?;
        }
        Ok(())
    }
}
