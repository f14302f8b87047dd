use {
    crate::buyer::BuyerId,
    serde::{Deserialize, Serialize},
    std::cmp::Ordering,
};

/// One buyer's bid-eligible inventory group.
///
/// A candidate is read from storage once per auction run and is never
/// modified afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub owner: String,
    pub buyer: BuyerId,
    /// Unique per `owner` and `buyer`.
    pub name: String,
    #[serde(default)]
    pub ads: Vec<Ad>,
    #[serde(default)]
    pub trusted_bidding_keys: Vec<String>,
    #[serde(default)]
    pub user_bidding_signals: String,
    /// Controls the inclusion order under byte pressure. Higher goes first.
    #[serde(default)]
    pub priority: f64,
    /// Whether the ads of this candidate may be left out of remote auction
    /// payloads.
    #[serde(default)]
    pub omit_ads: bool,
}

impl Candidate {
    /// Orders candidates by descending priority. Equal priorities compare
    /// equal so stable sorts keep the original order between them.
    pub fn by_priority_desc(a: &Self, b: &Self) -> Ordering {
        b.priority.total_cmp(&a.priority)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub render_id: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub counter_keys: Vec<String>,
}
