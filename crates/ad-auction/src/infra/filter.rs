use {super::CandidateFilter, model::Candidate};

/// Drops candidates owned by any of the given owners.
#[derive(Debug, Clone, Default)]
pub struct DeniedOwners(pub Vec<String>);

impl CandidateFilter for DeniedOwners {
    fn filter(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        let before = candidates.len();
        candidates.retain(|candidate| !self.0.contains(&candidate.owner));
        if candidates.len() < before {
            tracing::debug!(
                removed = before - candidates.len(),
                "filtered candidates of denied owners"
            );
        }
        candidates
    }
}
