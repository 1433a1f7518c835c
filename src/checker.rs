//! Probabilistic model checking through an external checker process.
//!
//! The transition system is written in explicit format to a fresh directory
//! created under the working directory for each call, each atomic proposition of the formula is replaced by the
//! quoted label it was exported under, and the checker is run as
//! `<program> --explicit <tra> <lab> --prop <formula>`. Its standard output
//! is returned verbatim.

use crate::proposition::{AtomicProposition, ScopeError};
use crate::ts::explicit::proposition_label;
use crate::ts::TransitionSystem;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("model checker `{0}` is not available")]
    NotAvailable(String),
    #[error("model checker failed with {status}: {output}")]
    Failed { status: ExitStatus, output: String },
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ModelChecker {
    program: String,
    work_dir: PathBuf,
}

impl Default for ModelChecker {
    fn default() -> Self {
        Self::new("storm", std::env::temp_dir())
    }
}

impl ModelChecker {
    pub fn new(program: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the checker can be started and exits successfully.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Checks `formula` on `ts` and returns the checker's output.
    ///
    /// Every proposition in the formula must describe some complex of the
    /// state space.
    pub fn check(&self, ts: &TransitionSystem, formula: &str) -> Result<String, CheckerError> {
        if !self.is_available() {
            return Err(CheckerError::NotAvailable(self.program.clone()));
        }

        let ordering = ts.ordering();
        let found = AtomicProposition::find_in(formula);
        let mut propositions = Vec::with_capacity(found.len());
        let mut rewritten = formula.to_string();
        for (index, (text, ap)) in found.into_iter().enumerate() {
            ap.check_scope(&ordering)?;
            rewritten = rewritten.replacen(&text, &format!("\"{}\"", proposition_label(index)), 1);
            propositions.push(ap);
        }

        // Removed with its contents when dropped.
        let dir = tempfile::Builder::new()
            .prefix("rulespace-check-")
            .tempdir_in(&self.work_dir)?;
        let transitions = dir.path().join("explicit_transitions.tra");
        let labels = dir.path().join("explicit_labels.lab");
        write_file(&transitions, |out| ts.write_explicit_transitions(out))?;
        write_file(&labels, |out| ts.write_explicit_labels(out, &propositions))?;

        debug!(program = %self.program, formula = %rewritten, "invoking model checker");
        let output = Command::new(&self.program)
            .arg("--explicit")
            .arg(&transitions)
            .arg(&labels)
            .arg("--prop")
            .arg(&rewritten)
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let mut text = stdout;
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(CheckerError::Failed {
                status: output.status,
                output: text,
            });
        }
        info!(program = %self.program, states = ts.len(), "model checking finished");
        Ok(stdout)
    }
}

fn write_file(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write(&mut out)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiset::Multiset;
    use crate::ts::{Memory, State};

    fn ts() -> TransitionSystem {
        let content: Multiset = [("X()::rep".parse().unwrap(), 1)].into_iter().collect();
        TransitionSystem::new(State::new(content, Memory::default()), 2)
    }

    /// A checker that echoes the explicit files it was handed.
    #[cfg(unix)]
    fn echo_checker(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("echo-checker");
        std::fs::write(&path, "#!/bin/sh\n[ \"$1\" = --version ] && exit 0\ncat \"$2\" \"$3\"\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn explicit_model(ts: &TransitionSystem, propositions: &[AtomicProposition]) -> String {
        let mut out = Vec::new();
        ts.write_explicit_transitions(&mut out).unwrap();
        ts.write_explicit_labels(&mut out, propositions).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn concurrent_checks_see_their_own_files() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let checker = ModelChecker::new(echo_checker(bin.path()).to_string_lossy(), work.path());
        assert!(checker.is_available());

        let formula = "P=? [F [X()::rep] >= 2]";
        let ap: AtomicProposition = "[X()::rep] >= 2".parse().unwrap();
        let systems: Vec<TransitionSystem> = [1, 3]
            .into_iter()
            .map(|n| {
                let content: Multiset = [("X()::rep".parse().unwrap(), n)].into_iter().collect();
                TransitionSystem::new(State::new(content, Memory::default()), 4)
            })
            .collect();
        let expected: Vec<String> = systems
            .iter()
            .map(|ts| explicit_model(ts, std::slice::from_ref(&ap)))
            .collect();
        assert_ne!(expected[0], expected[1]);

        std::thread::scope(|scope| {
            for (ts, expected) in systems.iter().zip(&expected) {
                let checker = &checker;
                scope.spawn(move || {
                    for _ in 0..10 {
                        assert_eq!(&checker.check(ts, formula).unwrap(), expected);
                    }
                });
            }
        });
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_program_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let checker = ModelChecker::new("rulespace-no-such-checker", dir.path());
        assert!(!checker.is_available());
        assert!(matches!(
            checker.check(&ts(), "P=? [F [X()::rep] = 0]"),
            Err(CheckerError::NotAvailable(_))
        ));
    }
}
