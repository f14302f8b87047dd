//! Packing of buyer candidates and signals into a size bounded, compressed
//! payload for remote auctions.
//!
//! Two strategies are available:
//! - [`Strategy::SellerMax`] fills the whole seller budget in descending
//!   priority order and checkpoints its size estimate with a bounded number
//!   of exact recalculations.
//! - [`Strategy::PerBuyerLimits`] splits the budget into per buyer limits,
//!   estimates sizes from one compression ratio sample per buyer and
//!   redistributes unused space afterwards.
//!
//! Both return the same [`Payload`] and only differ in which candidates end
//! up in it.

pub mod compression;
pub mod encoding;
pub mod estimator;
mod input;
mod metrics;
mod per_buyer_limits;
mod seller_max;

pub use {
    compression::{CompressedData, CompressionVersion, Compressor},
    estimator::CompressionRatio,
};
use {
    indexmap::IndexMap,
    input::Inputs,
    model::{BuyerId, Candidate, EncodedSignals},
    std::sync::Arc,
};

/// Fraction of a byte budget the packer aims to fill.
pub(crate) const UTILIZATION_GOAL: f64 = 0.9;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("payload size budget must be positive")]
    InvalidBudget,
    #[error("failed to encode buyer input: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("failed to compress buyer input: {0:#}")]
    Compression(anyhow::Error),
}

/// How candidates are picked when they don't all fit the budget.
#[derive(Clone, Debug, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    SellerMax {
        /// Upper bound of exact payload size computations.
        max_recalculations: usize,
    },
    PerBuyerLimits {
        /// Desired payload share per buyer in bytes. Buyers without a target
        /// get an equal share of the budget.
        targets: IndexMap<BuyerId, usize>,
    },
}

/// Packs buyer inputs into compressed payloads.
pub struct Packer {
    compressor: Arc<dyn Compressor>,
    max_size_bytes: usize,
    per_buyer_signals_max_size_bytes: usize,
    omit_ads: bool,
    strategy: Strategy,
}

impl Packer {
    pub fn new(
        compressor: Arc<dyn Compressor>,
        max_size_bytes: usize,
        per_buyer_signals_max_size_bytes: usize,
        omit_ads: bool,
        strategy: Strategy,
    ) -> Self {
        Self {
            compressor,
            max_size_bytes,
            per_buyer_signals_max_size_bytes,
            omit_ads,
            strategy,
        }
    }

    /// Packs candidates and signals into a payload of at most
    /// `max_size_bytes` compressed bytes.
    ///
    /// Compression is CPU bound so callers on an async runtime should run
    /// this on a blocking thread.
    pub fn pack(
        &self,
        candidates: &[Candidate],
        signals: &IndexMap<BuyerId, EncodedSignals>,
    ) -> Result<Payload, Error> {
        if self.max_size_bytes == 0 {
            return Err(Error::InvalidBudget);
        }

        let inputs = Inputs::encode(candidates, signals, self.omit_ads)?;
        if inputs.is_empty() {
            return Ok(Payload::default());
        }

        let payload = match &self.strategy {
            Strategy::SellerMax { max_recalculations } => {
                seller_max::pack(self, &inputs, *max_recalculations)?
            }
            Strategy::PerBuyerLimits { targets } => per_buyer_limits::pack(self, &inputs, targets)?,
        };

        metrics::packed(&self.strategy, candidates.len(), &payload);
        tracing::debug!(
            strategy = <&'static str>::from(&self.strategy),
            status = <&'static str>::from(payload.status),
            size = payload.total_size(),
            max_size = self.max_size_bytes,
            buyers = payload.buyers.len(),
            recalculations = payload.recalculations,
            "packed buyer input"
        );
        Ok(payload)
    }
}

/// Outcome of packing a buyer input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    /// Everything selected fit without removing candidates afterwards.
    #[default]
    WithinBudget,
    /// Candidates had to be removed after the exact size was known.
    Truncated,
    /// The payload is still larger than the budget because nothing more
    /// could be removed.
    OverBudget,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuyerStats {
    pub candidates: usize,
    pub ads: usize,
    pub signals: bool,
}

/// Compressed per buyer inputs ready to be sent to a remote auction.
#[derive(Clone, Debug, Default)]
pub struct Payload {
    /// Only buyers that contribute candidates or signals, in stable order.
    pub buyers: IndexMap<BuyerId, CompressedData>,
    pub status: Status,
    /// Exact size computations used by [`Strategy::SellerMax`].
    pub recalculations: usize,
    pub stats: IndexMap<BuyerId, BuyerStats>,
}

impl Payload {
    pub fn total_size(&self) -> usize {
        input::total_size(&self.buyers)
    }

    pub fn is_empty(&self) -> bool {
        self.buyers.is_empty()
    }

    pub fn candidates(&self) -> usize {
        self.stats.values().map(|stats| stats.candidates).sum()
    }

    fn new(
        buyers: IndexMap<BuyerId, CompressedData>,
        accumulators: &input::Accumulators,
        status: Status,
        recalculations: usize,
    ) -> Self {
        let stats = accumulators
            .0
            .iter()
            .filter(|(_, input)| !input.is_empty())
            .map(|(buyer, input)| {
                let stats = BuyerStats {
                    candidates: input.candidates().len(),
                    ads: input.ads(),
                    signals: input.has_signals(),
                };
                ((**buyer).clone(), stats)
            })
            .collect();
        Self {
            buyers,
            status,
            recalculations,
            stats,
        }
    }
}
