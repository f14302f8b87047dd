use {
    crate::{buyer::BuyerId, candidate::Ad},
    serde::{Deserialize, Serialize},
};

/// A single ad bid as produced by a buyer's bidding logic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdWithBid {
    pub ad: Ad,
    pub bid: f64,
    #[serde(default)]
    pub ad_cost: Option<f64>,
    #[serde(default)]
    pub debug_report: DebugReport,
}

impl AdWithBid {
    /// Negative, NaN and infinite bids never take part in an auction.
    pub fn is_eligible(&self) -> bool {
        self.bid.is_finite() && self.bid >= 0.
    }
}

/// Debug reporting endpoints a buyer asked to be notified on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub win: Option<String>,
    pub loss: Option<String>,
}

/// The ad a candidate (or a contextual source) bids with in one auction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResult {
    pub buyer: BuyerId,
    /// Name of the bidding candidate. `None` for contextual bids.
    pub candidate: Option<String>,
    pub ad: Ad,
    pub bid: f64,
    #[serde(default)]
    pub ad_cost: Option<f64>,
    #[serde(default)]
    pub debug_report: DebugReport,
}

impl BidResult {
    pub fn new(buyer: BuyerId, candidate: Option<String>, ad_with_bid: AdWithBid) -> Self {
        Self {
            buyer,
            candidate,
            ad: ad_with_bid.ad,
            bid: ad_with_bid.bid,
            ad_cost: ad_with_bid.ad_cost,
            debug_report: ad_with_bid.debug_report,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.bid.is_finite() && self.bid >= 0.
    }
}
