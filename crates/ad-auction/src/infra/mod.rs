//! Collaborators the auction depends on: candidate storage, candidate
//! filtering and the engine executing buyer and seller provided logic.

pub mod filter;
pub mod storage;

use {
    crate::domain::auction::{AuctionWinner, ReportingContext},
    chrono::{DateTime, Utc},
    indexmap::IndexMap,
    model::{AdWithBid, BidResult, BuyerId, Candidate, EncodedSignals},
    serde_json::Value,
    std::time::Duration,
};

/// Failure of buyer or seller provided logic.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScriptFailure {
    #[error("script failed: {0}")]
    Failure(String),
    #[error("script returned invalid output: {0}")]
    InvalidOutput(String),
}

/// Signals available to a buyer's bidding logic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BiddingSignals {
    pub seller: String,
    pub auction_signals: Value,
    pub per_buyer_signals: Option<Value>,
}

/// Signals available to the seller's scoring logic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoringSignals {
    pub seller: String,
    pub auction_signals: Value,
    pub seller_signals: Value,
}

/// Candidates are only considered if they were active within this window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveWindow {
    pub now: DateTime<Utc>,
    pub max_age: Duration,
}

impl ActiveWindow {
    pub fn ending_now(max_age: Duration) -> Self {
        Self {
            now: Utc::now(),
            max_age,
        }
    }
}

/// Removes candidates that must not take part in an auction.
#[cfg_attr(test, mockall::automock)]
pub trait CandidateFilter: Send + Sync {
    /// Keeps the relative order of the remaining candidates.
    fn filter(&self, candidates: Vec<Candidate>) -> Vec<Candidate>;
}

/// Runs buyer provided bidding logic and seller provided scoring logic.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Bids for each ad of the candidate.
    async fn bid(
        &self,
        candidate: &Candidate,
        signals: &BiddingSignals,
    ) -> Result<Vec<AdWithBid>, ScriptFailure>;

    /// Scores the bids. The returned scores are index aligned with `bids`.
    async fn score(
        &self,
        bids: &[BidResult],
        signals: &ScoringSignals,
    ) -> Result<Vec<f64>, ScriptFailure>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Candidates of the given buyers that were active within the window.
    async fn fetch_candidates(
        &self,
        buyers: &[BuyerId],
        window: ActiveWindow,
    ) -> anyhow::Result<Vec<Candidate>>;

    async fn fetch_signals(
        &self,
        buyers: &[BuyerId],
    ) -> anyhow::Result<IndexMap<BuyerId, EncodedSignals>>;

    async fn persist_winner(
        &self,
        winner: &AuctionWinner,
        context: &ReportingContext,
    ) -> anyhow::Result<()>;
}
