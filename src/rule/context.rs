//! Context completion: expanding a rule into the ground reactions it denotes.
//!
//! Every pair of the rule is completed independently against the model's
//! signatures (see [`Agent::add_context`]) and the completions are combined
//! by Cartesian product. Each element of the product writes concrete agents
//! back into the rule's positions and yields one reaction.
//!
//! Replication rules (`A => A + A`, every pair rooted at the same reactant)
//! are completed through their first pair only; the resulting product agent
//! is then copied into every product position, so the copies can never be
//! contextualized independently of each other.

use super::Rule;
use crate::agent::{cartesian_product, Agent, Counterpart};
use crate::reaction::Reaction;
use crate::signature::{SignatureError, Signatures};
use std::collections::BTreeSet;
use tracing::trace;

impl Rule {
    /// Whether all pairs share one reactant index, i.e. `A => n A`.
    pub fn is_replication(&self) -> bool {
        match self.pairs.first() {
            Some(&(Some(source), _)) if self.pairs.len() > 1 => {
                self.pairs.iter().all(|&(l, _)| l == Some(source))
            }
            _ => false,
        }
    }

    /// All ground reactions this rule denotes, deduplicated and sorted.
    ///
    /// A name absent from the signatures is an internal inconsistency and is
    /// reported rather than skipped.
    pub fn create_reactions(&self, signatures: &Signatures) -> Result<Vec<Reaction>, SignatureError> {
        let instances = if self.is_replication() {
            self.replication_instances(signatures)?
        } else {
            self.pairwise_instances(signatures)?
        };
        let reactions: BTreeSet<Reaction> = instances
            .iter()
            .map(|agents| self.reaction_of(agents))
            .collect();
        trace!(
            rule = %self,
            instances = instances.len(),
            reactions = reactions.len(),
            "context completed"
        );
        Ok(reactions.into_iter().collect())
    }

    fn pairwise_instances(&self, signatures: &Signatures) -> Result<Vec<Vec<Agent>>, SignatureError> {
        let mut options = Vec::with_capacity(self.pairs.len());
        for &pair in &self.pairs {
            let completed = match pair {
                (Some(l), Some(r)) => {
                    self.agents[l].add_context(Counterpart::Paired(&self.agents[r]), signatures)?
                }
                (Some(l), None) => self.agents[l].add_context(Counterpart::Consumed, signatures)?,
                (None, Some(r)) => self.agents[r].add_context(Counterpart::Produced, signatures)?,
                (None, None) => vec![(None, None)],
            };
            options.push(completed);
        }

        Ok(cartesian_product(&options)
            .into_iter()
            .map(|choice| {
                let mut agents = self.agents.clone();
                for (&(l, r), (left, right)) in self.pairs.iter().zip(choice) {
                    if let (Some(i), Some(agent)) = (l, left) {
                        agents[i] = agent;
                    }
                    if let (Some(j), Some(agent)) = (r, right) {
                        agents[j] = agent;
                    }
                }
                agents
            })
            .collect())
    }

    fn replication_instances(&self, signatures: &Signatures) -> Result<Vec<Vec<Agent>>, SignatureError> {
        let (Some(source), Some(first)) = self.pairs[0] else {
            return self.pairwise_instances(signatures);
        };
        let completed =
            self.agents[source].add_context(Counterpart::Paired(&self.agents[first]), signatures)?;

        Ok(completed
            .into_iter()
            .map(|(left, right)| {
                let mut agents = self.agents.clone();
                if let Some(agent) = left {
                    agents[source] = agent;
                }
                if let Some(copy) = right {
                    for &(_, target) in &self.pairs {
                        if let Some(j) = target {
                            agents[j] = copy.clone();
                        }
                    }
                }
                agents
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiset::Multiset;

    fn signatures_of(rules: &[&Rule], extra: &[&str]) -> Signatures {
        let mut agents: Vec<Agent> = rules.iter().flat_map(|r| r.agents().to_vec()).collect();
        for text in extra {
            let complex: crate::complex::Complex = text.parse().unwrap();
            agents.extend(complex.agents().iter().cloned());
        }
        Signatures::from_agents(&agents)
    }

    #[test]
    fn ground_rule_yields_itself() {
        let rule: Rule = "X()::rep => @ k1*[X()::rep]".parse().unwrap();
        let sig = signatures_of(&[&rule], &[]);
        let reactions = rule.create_reactions(&sig).unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].to_string(), "1 X()::rep =>  @ k1*[X()::rep]");
    }

    #[test]
    fn shared_wildcard_keeps_its_state_across_the_rewrite() {
        let rule: Rule = "A(s{_},t{i})::c => A(s{_},t{a})::c".parse().unwrap();
        let sig = signatures_of(&[&rule], &["A(s{p},t{i})::c", "A(s{u},t{a})::c"]);
        let reactions = rule.create_reactions(&sig).unwrap();
        assert_eq!(reactions.len(), 2);
        for reaction in &reactions {
            let lhs = &reaction.lhs().complexes()[0];
            let rhs = &reaction.rhs().complexes()[0];
            let (Agent::Structure(l), Agent::Structure(r)) = (&lhs.agents()[0], &rhs.agents()[0]) else {
                panic!("expected structures");
            };
            assert_eq!(l.get("s"), r.get("s"));
            assert!(lhs.is_ground() && rhs.is_ground());
        }
    }

    #[test]
    fn replication_copies_one_completed_agent() {
        let rule: Rule = "A()::c => A()::c + A()::c".parse().unwrap();
        let sig = signatures_of(&[&rule], &["A(s{p})::c", "A(s{u})::c"]);
        let reactions = rule.create_reactions(&sig).unwrap();
        assert_eq!(reactions.len(), 2);
        for reaction in &reactions {
            let products = reaction.rhs().to_multiset();
            assert_eq!(products.len(), 1);
            assert_eq!(products.max_count(), 2);
            let reactant = &reaction.lhs().complexes()[0];
            assert_eq!(products.count(reactant), 2);
        }
    }

    #[test]
    fn consumed_agents_expand_over_all_states() {
        let rule: Rule = "K{_}::c => ".parse().unwrap();
        let sig = signatures_of(&[&rule], &["K{p}::c", "K{u}::c"]);
        let reactions = rule.create_reactions(&sig).unwrap();
        let consumed: Vec<Multiset> = reactions.iter().map(|r| r.consumed().clone()).collect();
        assert_eq!(consumed.len(), 2);
        assert!(reactions.iter().all(|r| r.rhs().is_empty()));
    }

    #[test]
    fn missing_signature_entry_is_reported() {
        let rule: Rule = "K{_}::c => ".parse().unwrap();
        let err = rule.create_reactions(&Signatures::default()).unwrap_err();
        assert_eq!(err, SignatureError::UnknownAtomic("K".into()));
    }
}
