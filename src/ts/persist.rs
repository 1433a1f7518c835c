//! Saving and loading transition systems.
//!
//! The persisted document references states by encoded id and stores each
//! state as its count vector over the ordering, written as a tuple
//! (`"(2, 0, 1)"`, `"(3,)"`). The hell state is the vector of `inf`. A
//! partially explored system additionally lists its unprocessed states, so a
//! later run can resume where this one stopped.

use super::edge::Edge;
use super::state::{Memory, MemoryLevel, State};
use super::system::TransitionSystem;
use crate::complex::{Complex, NotationError};
use crate::multiset::Multiset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("malformed ordering entry: {0}")]
    Ordering(#[from] NotationError),
    #[error("malformed state vector `{0}`")]
    MalformedVector(String),
    #[error("state vector `{vector}` has {found} entries, ordering has {expected}")]
    VectorLength {
        vector: String,
        found: usize,
        expected: usize,
    },
    #[error("unknown memory level {0}")]
    MemoryLevel(u8),
    #[error("edge references unknown node {0}")]
    UnknownNode(usize),
    #[error("node {0} is listed twice")]
    DuplicateNode(usize),
}

/// Serialized form of a single edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub s: usize,
    pub t: usize,
    pub p: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Serialized form of a [`TransitionSystem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsDocument {
    pub ordering: Vec<String>,
    pub bound: u32,
    pub nodes: BTreeMap<usize, String>,
    pub edges: Vec<EdgeRecord>,
    pub initial: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub memory: u8,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub history: BTreeMap<usize, Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unprocessed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

fn is_zero(level: &u8) -> bool {
    *level == 0
}

fn format_vector(values: &[u32]) -> String {
    match values {
        [single] => format!("({single},)"),
        _ => {
            let items: Vec<String> = values.iter().map(u32::to_string).collect();
            format!("({})", items.join(", "))
        }
    }
}

fn hell_vector(len: usize) -> String {
    match len {
        0 | 1 => "(inf,)".to_string(),
        n => format!("({})", vec!["inf"; n].join(", ")),
    }
}

/// `None` stands for the hell state.
fn parse_vector(text: &str, expected: usize) -> Result<Option<Vec<u32>>, PersistError> {
    let malformed = || PersistError::MalformedVector(text.to_string());
    let inner = text
        .trim()
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(malformed)?;
    let items: Vec<&str> = inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect();
    if items.first().is_some_and(|item| *item == "inf") {
        return Ok(None);
    }
    if items.len() != expected {
        return Err(PersistError::VectorLength {
            vector: text.to_string(),
            found: items.len(),
            expected,
        });
    }
    items
        .iter()
        .map(|item| item.parse::<u32>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

impl TransitionSystem {
    /// The persisted form. Ids are taken from [`encoding`](Self::encoding).
    pub fn to_document(&self) -> TsDocument {
        let ordering = self.ordering();
        let ids = self.encoding();
        let vector_of = |state: &State| match state.to_vector(&ordering) {
            Some(values) => format_vector(&values),
            None => hell_vector(ordering.len()),
        };

        let mut nodes = BTreeMap::new();
        let mut history = BTreeMap::new();
        for (slot, state) in self.states().enumerate() {
            nodes.insert(ids[slot], vector_of(state));
            if !state.memory().history().is_empty() {
                history.insert(ids[slot], state.memory().history().to_vec());
            }
        }

        let mut edges: Vec<EdgeRecord> = self
            .edges()
            .iter()
            .map(|e| EdgeRecord {
                s: ids[e.source()],
                t: ids[e.target()],
                p: e.probability(),
                label: e.label().map(str::to_string),
            })
            .collect();
        edges.sort_by(|a, b| (a.s, a.t).cmp(&(b.s, b.t)));

        let unprocessed: BTreeSet<String> = self.unprocessed().map(vector_of).collect();

        TsDocument {
            ordering: ordering.iter().map(Complex::to_string).collect(),
            bound: self.bound(),
            nodes,
            edges,
            initial: ids[self.init_slot()],
            memory: self.memory_level().level(),
            history,
            unprocessed: unprocessed.into_iter().collect(),
            parameters: self.params().to_vec(),
        }
    }

    /// Rebuilds a system from its persisted form.
    ///
    /// A node is unprocessed when its vector is listed as unprocessed and it
    /// has no outgoing edges; everything else is considered expanded.
    pub fn from_document(document: TsDocument) -> Result<Self, PersistError> {
        let ordering = document
            .ordering
            .iter()
            .map(|text| text.parse::<Complex>())
            .collect::<Result<Vec<_>, _>>()?;
        let level =
            MemoryLevel::from_level(document.memory).ok_or(PersistError::MemoryLevel(document.memory))?;

        let mut ts = TransitionSystem::empty(document.bound);
        let mut slots = BTreeMap::new();
        for (&id, vector) in &document.nodes {
            let state = match parse_vector(vector, ordering.len())? {
                None => State::hell(),
                Some(values) => {
                    let history = document.history.get(&id).cloned().unwrap_or_default();
                    State::new(
                        Multiset::from_vector(&ordering, &values),
                        Memory::with_history(level, history),
                    )
                }
            };
            let (slot, new) = ts.intern(state);
            if !new {
                return Err(PersistError::DuplicateNode(id));
            }
            ts.assign_id(slot, id);
            slots.insert(id, slot);
        }

        let slot_of = |id: usize| slots.get(&id).copied().ok_or(PersistError::UnknownNode(id));
        ts.set_init(slot_of(document.initial)?);
        let mut has_edges = BTreeSet::new();
        for record in &document.edges {
            let source = slot_of(record.s)?;
            let target = slot_of(record.t)?;
            ts.push_edge(Edge::new(source, target, record.p, record.label.clone()));
            has_edges.insert(record.s);
        }

        let unprocessed: BTreeSet<&str> = document.unprocessed.iter().map(String::as_str).collect();
        for (&id, vector) in &document.nodes {
            let slot = slots[&id];
            if unprocessed.contains(vector.as_str()) && !has_edges.contains(&id) {
                ts.push_frontier(slot);
            } else {
                ts.mark_processed(slot);
            }
        }
        ts.set_params(document.parameters);
        Ok(ts)
    }

    pub fn to_json_string(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, PersistError> {
        Self::from_document(serde_json::from_str(text)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, &self.to_document())?;
        writer.flush()?;
        info!(
            path = %path.as_ref().display(),
            states = self.len(),
            unprocessed = self.frontier_len(),
            "transition system saved"
        );
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let ts = Self::from_document(serde_json::from_reader(reader)?)?;
        info!(
            path = %path.as_ref().display(),
            states = ts.len(),
            unprocessed = ts.frontier_len(),
            "transition system loaded"
        );
        Ok(ts)
    }

    pub fn save_cbor(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_cbor::to_writer(&mut writer, &self.to_document())?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_cbor(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let reader = BufReader::new(File::open(path)?);
        Self::from_document(serde_cbor::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(entries: &[(&str, u32)], memory: Memory) -> State {
        let content: Multiset = entries
            .iter()
            .map(|(c, n)| (c.parse::<Complex>().unwrap(), *n))
            .collect();
        State::new(content, memory)
    }

    fn partial() -> TransitionSystem {
        let memory = Memory::new(MemoryLevel::Last);
        let mut ts = TransitionSystem::new(state(&[("X()::rep", 1)], memory.clone()), 2);
        let (slot, _) = ts.pop_frontier().unwrap();
        ts.record_expansion(
            slot,
            vec![
                (state(&[("X()::rep", 2)], memory.update(Some("grow"))), 0.75, Some("grow".into())),
                (state(&[], memory.update(None)), 0.25, None),
            ],
        );
        let (slot, _) = ts.pop_frontier().unwrap();
        ts.record_expansion(slot, vec![(State::hell(), 1.0, Some("grow".into()))]);
        ts.set_params(["k".to_string()]);
        ts
    }

    #[test]
    fn vectors_use_tuple_notation() {
        assert_eq!(format_vector(&[]), "()");
        assert_eq!(format_vector(&[2]), "(2,)");
        assert_eq!(format_vector(&[2, 1]), "(2, 1)");
        assert_eq!(parse_vector("(2, 1)", 2).unwrap(), Some(vec![2, 1]));
        assert_eq!(parse_vector("(inf, inf)", 2).unwrap(), None);
        assert!(matches!(
            parse_vector("(2,)", 2),
            Err(PersistError::VectorLength { .. })
        ));
        assert!(parse_vector("2, 1", 2).is_err());
    }

    #[test]
    fn document_lists_the_frontier() {
        let doc = partial().to_document();
        assert_eq!(doc.ordering, vec!["X()::rep".to_string()]);
        assert_eq!(doc.initial, 0);
        assert_eq!(doc.memory, 1);
        assert_eq!(doc.nodes.len(), 4);
        assert_eq!(doc.unprocessed.len(), 2);
        assert!(doc.unprocessed.contains(&"(inf,)".to_string()));
        assert_eq!(doc.parameters, vec!["k".to_string()]);
    }

    #[test]
    fn json_round_trip_preserves_the_document() {
        let ts = partial();
        let text = ts.to_json_string().unwrap();
        let loaded = TransitionSystem::from_json_str(&text).unwrap();
        assert_eq!(loaded.len(), ts.len());
        assert_eq!(loaded.frontier_len(), ts.frontier_len());
        assert_eq!(loaded.to_document(), ts.to_document());
        assert_eq!(loaded.to_json_string().unwrap(), text);
    }

    #[test]
    fn file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ts = partial();

        let json = dir.path().join("ts.json");
        ts.save_json(&json).unwrap();
        assert_eq!(TransitionSystem::load_json(&json).unwrap().to_document(), ts.to_document());

        let cbor = dir.path().join("ts.cbor");
        ts.save_cbor(&cbor).unwrap();
        assert_eq!(TransitionSystem::load_cbor(&cbor).unwrap().to_document(), ts.to_document());
    }

    #[test]
    fn dangling_edges_are_rejected() {
        let mut doc = partial().to_document();
        doc.edges.push(EdgeRecord {
            s: 0,
            t: 99,
            p: 1.0,
            label: None,
        });
        assert!(matches!(
            TransitionSystem::from_document(doc),
            Err(PersistError::UnknownNode(99))
        ));
    }
}
