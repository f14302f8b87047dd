//! Storage backed by a JSON file, used for dry runs.

use {
    super::{ActiveWindow, Storage},
    crate::domain::auction::{AuctionWinner, ReportingContext},
    anyhow::Context,
    indexmap::IndexMap,
    model::{BuyerId, Candidate, EncodedSignals},
    serde::Deserialize,
    std::path::Path,
};

/// Candidates and signals loaded from a file of the form
/// `{"candidates": [...], "signals": {"<buyer>": "<base64>"}}`.
///
/// Candidates in the file are always considered active.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonFile {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    signals: IndexMap<BuyerId, EncodedSignals>,
}

impl JsonFile {
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Every buyer in the file in order of appearance.
    pub fn buyers(&self) -> Vec<BuyerId> {
        let mut buyers: Vec<BuyerId> = Vec::new();
        let all = self
            .candidates
            .iter()
            .map(|candidate| &candidate.buyer)
            .chain(self.signals.keys());
        for buyer in all {
            if !buyers.contains(buyer) {
                buyers.push(buyer.clone());
            }
        }
        buyers
    }
}

#[async_trait::async_trait]
impl Storage for JsonFile {
    async fn fetch_candidates(
        &self,
        buyers: &[BuyerId],
        _: ActiveWindow,
    ) -> anyhow::Result<Vec<Candidate>> {
        Ok(self
            .candidates
            .iter()
            .filter(|candidate| buyers.contains(&candidate.buyer))
            .cloned()
            .collect())
    }

    async fn fetch_signals(
        &self,
        buyers: &[BuyerId],
    ) -> anyhow::Result<IndexMap<BuyerId, EncodedSignals>> {
        Ok(self
            .signals
            .iter()
            .filter(|(buyer, _)| buyers.contains(buyer))
            .map(|(buyer, signals)| (buyer.clone(), signals.clone()))
            .collect())
    }

    async fn persist_winner(
        &self,
        winner: &AuctionWinner,
        context: &ReportingContext,
    ) -> anyhow::Result<()> {
        tracing::info!(
            buyer = %context.buyer,
            bid = winner.winner.bid.bid,
            score = winner.winner.score,
            runner_up_score = ?context.runner_up_score,
            "auction winner (not persisted in dry run)"
        );
        Ok(())
    }
}
