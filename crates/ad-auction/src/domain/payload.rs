//! Buyer input payloads for auctions that run on a remote auction service.

use {
    super::auction::Error,
    crate::{
        config,
        infra::{ActiveWindow, CandidateFilter, Storage},
    },
    anyhow::anyhow,
    buyer_input::{Packer, Payload},
    model::BuyerId,
    std::{sync::Arc, time::Duration},
    tracing::Instrument,
};

/// Collects, filters and packs the candidates and signals of a set of buyers
/// into a compressed payload of bounded size.
pub struct PayloadGenerator {
    storage: Arc<dyn Storage>,
    filter: Arc<dyn CandidateFilter>,
    packer: Arc<Packer>,
    timeout: Duration,
    active_window: Duration,
}

impl PayloadGenerator {
    pub fn new(
        storage: Arc<dyn Storage>,
        filter: Arc<dyn CandidateFilter>,
        config: &config::Payload,
        active_window: Duration,
    ) -> Self {
        Self {
            storage,
            filter,
            packer: Arc::new(config.packer()),
            timeout: config.overall_timeout,
            active_window,
        }
    }

    pub async fn generate(&self, buyers: &[BuyerId], seller: &str) -> Result<Payload, Error> {
        tokio::time::timeout(self.timeout, self.generate_inner(buyers))
            .instrument(tracing::info_span!("payload", seller))
            .await
            .unwrap_or(Err(Error::Timeout))
    }

    async fn generate_inner(&self, buyers: &[BuyerId]) -> Result<Payload, Error> {
        let candidates = self
            .storage
            .fetch_candidates(buyers, ActiveWindow::ending_now(self.active_window))
            .await
            .map_err(Error::CandidateFetch)?;
        let candidates = self.filter.filter(candidates);
        let signals = self
            .storage
            .fetch_signals(buyers)
            .await
            .map_err(Error::CandidateFetch)?;
        tracing::debug!(
            buyers = buyers.len(),
            candidates = candidates.len(),
            signals = signals.len(),
            "collected buyer input"
        );
        if candidates.is_empty() && signals.is_empty() {
            return Ok(Payload::default());
        }

        // Compression is CPU bound.
        let packer = Arc::clone(&self.packer);
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || span.in_scope(|| packer.pack(&candidates, &signals)))
            .await
            .map_err(|err| Error::Internal(anyhow!("packing task failed: {err}")))?
            .map_err(Error::from)
    }
}
