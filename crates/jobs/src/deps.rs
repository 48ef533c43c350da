//! Parent/child job dependencies.
//!
//! A child job is runnable only once every parent has finished
//! successfully; if any parent finished with an error the child is
//! failed at admission time without its worker ever being invoked.
//! Cycles are prevented by construction (a parent must already be
//! enqueued or finished to have an ID), but self-edges are rejected
//! explicitly.

use std::collections::HashMap;

use crate::error::JobsError;

/// Completion state of a parent as observed by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParentState {
    Unfinished,
    FinishedOk,
    FinishedFailed,
}

#[derive(Debug, Clone)]
struct ParentLink {
    id: String,
    state: ParentState,
}

/// Mapping from child job ID to its parents and their states.
#[derive(Debug, Default)]
pub struct JobDeps {
    edges: HashMap<String, Vec<ParentLink>>,
}

impl JobDeps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a child → parent edge. Multiple parents per child are
    /// supported; a duplicate edge is a no-op.
    pub fn add(&mut self, child: &str, parent: &str) -> Result<(), JobsError> {
        if child == parent {
            return Err(JobsError::SelfDependency(child.to_string()));
        }
        let links = self.edges.entry(child.to_string()).or_default();
        if links.iter().all(|link| link.id != parent) {
            links.push(ParentLink {
                id: parent.to_string(),
                state: ParentState::Unfinished,
            });
        }
        Ok(())
    }

    /// Whether the child has any registered dependencies.
    pub fn contains(&self, child: &str) -> bool {
        self.edges.contains_key(child)
    }

    /// Whether any parent of `child` is still unfinished.
    pub fn must_wait(&self, child: &str) -> Result<bool, JobsError> {
        let links = self.links_of(child)?;
        Ok(links
            .iter()
            .any(|link| link.state == ParentState::Unfinished))
    }

    /// Whether any parent of `child` finished with a failure.
    pub fn has_failed_parent(&self, child: &str) -> Result<bool, JobsError> {
        let links = self.links_of(child)?;
        Ok(links
            .iter()
            .any(|link| link.state == ParentState::FinishedFailed))
    }

    /// Mark a parent as finished. Idempotent: only the first transition
    /// out of the unfinished state is recorded.
    pub fn set_parent_finished(&mut self, parent: &str, was_failure: bool) {
        let new_state = if was_failure {
            ParentState::FinishedFailed
        } else {
            ParentState::FinishedOk
        };
        for links in self.edges.values_mut() {
            for link in links.iter_mut() {
                if link.id == parent && link.state == ParentState::Unfinished {
                    link.state = new_state;
                }
            }
        }
    }

    /// Drop all edges of a child (after it has been admitted or failed).
    pub fn remove(&mut self, child: &str) {
        self.edges.remove(child);
    }

    fn links_of(&self, child: &str) -> Result<&[ParentLink], JobsError> {
        match self.edges.get(child) {
            Some(links) if !links.is_empty() => Ok(links),
            // A record with no parents means the graph was corrupted.
            Some(_) => Err(JobsError::InconsistentDependency(child.to_string())),
            None => Ok(&[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_without_deps_never_waits() {
        let deps = JobDeps::new();
        assert!(!deps.must_wait("a").unwrap());
        assert!(!deps.has_failed_parent("a").unwrap());
    }

    #[test]
    fn child_waits_until_parent_finishes() {
        let mut deps = JobDeps::new();
        deps.add("b", "a").unwrap();
        assert!(deps.must_wait("b").unwrap());

        deps.set_parent_finished("a", false);
        assert!(!deps.must_wait("b").unwrap());
        assert!(!deps.has_failed_parent("b").unwrap());
    }

    #[test]
    fn failed_parent_is_reported() {
        let mut deps = JobDeps::new();
        deps.add("b", "a").unwrap();
        deps.set_parent_finished("a", true);
        assert!(!deps.must_wait("b").unwrap());
        assert!(deps.has_failed_parent("b").unwrap());
    }

    #[test]
    fn multiple_parents_all_must_finish() {
        let mut deps = JobDeps::new();
        deps.add("c", "a").unwrap();
        deps.add("c", "b").unwrap();

        deps.set_parent_finished("a", false);
        assert!(deps.must_wait("c").unwrap());

        deps.set_parent_finished("b", false);
        assert!(!deps.must_wait("c").unwrap());
    }

    #[test]
    fn set_parent_finished_is_idempotent() {
        let mut deps = JobDeps::new();
        deps.add("b", "a").unwrap();
        deps.set_parent_finished("a", false);
        // A later (bogus) failure report must not flip the state.
        deps.set_parent_finished("a", true);
        assert!(!deps.has_failed_parent("b").unwrap());
    }

    #[test]
    fn self_edge_is_rejected() {
        let mut deps = JobDeps::new();
        assert!(matches!(
            deps.add("a", "a"),
            Err(JobsError::SelfDependency(_))
        ));
    }

    #[test]
    fn duplicate_edge_is_noop() {
        let mut deps = JobDeps::new();
        deps.add("b", "a").unwrap();
        deps.add("b", "a").unwrap();
        deps.set_parent_finished("a", false);
        assert!(!deps.must_wait("b").unwrap());
    }
}
