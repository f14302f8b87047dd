//! On-device auctions: bidding, scoring and selecting a single winner among
//! the candidates of the participating buyers.

pub mod orchestrator;

pub use orchestrator::Orchestrator;
use {
    crate::infra::ScriptFailure,
    model::{BidResult, BuyerId},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    std::collections::HashMap,
};

/// Everything a seller provides to start an auction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionParameters {
    pub seller: String,
    /// Only candidates of these buyers take part.
    pub buyers: Vec<BuyerId>,
    #[serde(default)]
    pub auction_signals: Value,
    #[serde(default)]
    pub seller_signals: Value,
    #[serde(default)]
    pub per_buyer_signals: HashMap<BuyerId, Value>,
    /// Bids computed outside of the device. They skip bidding and are scored
    /// together with the candidate bids.
    #[serde(default)]
    pub contextual_bids: Vec<BidResult>,
}

/// A bid together with the score the seller gave it.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredBid {
    pub bid: BidResult,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuctionWinner {
    pub winner: ScoredBid,
    /// The bid with the second highest positive score. Only used for
    /// reporting.
    pub runner_up: Option<ScoredBid>,
}

/// Data needed to report an auction result to the seller and the winning
/// buyer.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportingContext {
    pub seller: String,
    pub buyer: BuyerId,
    pub candidate: Option<String>,
    pub render_id: String,
    pub winning_bid: f64,
    pub ad_cost: Option<f64>,
    pub runner_up_score: Option<f64>,
    pub debug_win_uri: Option<String>,
    pub debug_loss_uri: Option<String>,
}

impl ReportingContext {
    pub fn new(seller: &str, winner: &AuctionWinner) -> Self {
        let bid = &winner.winner.bid;
        Self {
            seller: seller.to_owned(),
            buyer: bid.buyer.clone(),
            candidate: bid.candidate.clone(),
            render_id: bid.ad.render_id.clone(),
            winning_bid: bid.bid,
            ad_cost: bid.ad_cost,
            runner_up_score: winner.runner_up.as_ref().map(|runner_up| runner_up.score),
            debug_win_uri: bid.debug_report.win.clone(),
            debug_loss_uri: winner
                .runner_up
                .as_ref()
                .and_then(|runner_up| runner_up.bid.debug_report.loss.clone()),
        }
    }
}

/// Terminal outcome of an auction or payload generation run.
#[derive(Debug, thiserror::Error, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Error {
    #[error("no candidates")]
    NoCandidates,
    #[error("no valid bids")]
    NoValidBids,
    #[error("no bid with a positive score")]
    NoWinner,
    #[error("deadline exceeded")]
    Timeout,
    #[error(transparent)]
    Script(#[from] ScriptFailure),
    #[error("failed to persist winner: {0:#}")]
    Persistence(anyhow::Error),
    #[error("failed to fetch candidates: {0:#}")]
    CandidateFetch(anyhow::Error),
    #[error(transparent)]
    Packing(#[from] buyer_input::Error),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl Error {
    /// Short name used as metric label.
    pub fn label(&self) -> &'static str {
        self.into()
    }
}
