use {
    anyhow::{anyhow, ensure},
    serde::{Deserialize, Serialize},
    std::{collections::HashSet, path::Path, time::Duration},
};

pub mod payload;

pub use payload::{BuyerTarget, Payload, Strategy};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub auction: Auction,

    /// Limits and packing strategy of buyer input payloads for remote
    /// auctions.
    #[serde(default)]
    pub payload: Payload,
}

impl Configuration {
    pub async fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        match toml::from_str(&tokio::fs::read_to_string(&path).await?) {
            Ok(self_) => Ok(self_),
            Err(err) if std::env::var("TOML_TRACE_ERROR").is_ok_and(|v| v == "1") => Err(anyhow!(
                "failed to parse TOML config at {}: {err:#?}",
                path.as_ref().display()
            )),
            Err(_) => Err(anyhow!(
                "failed to parse TOML config at: {}. Set TOML_TRACE_ERROR=1 to print parsing \
                 error but this may leak secrets.",
                path.as_ref().display()
            )),
        }
    }

    pub async fn to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        Ok(tokio::fs::write(path, toml::to_string_pretty(self)?).await?)
    }

    pub fn validate(self) -> anyhow::Result<Self> {
        ensure!(
            !self.auction.overall_timeout.is_zero(),
            "auction overall-timeout must be positive"
        );
        ensure!(
            !self.auction.bidding_timeout_per_candidate.is_zero(),
            "bidding-timeout-per-candidate must be positive"
        );
        ensure!(
            !self.auction.scoring_timeout.is_zero(),
            "scoring-timeout must be positive"
        );
        ensure!(
            self.auction.concurrent_bidding_count > 0,
            "concurrent-bidding-count must be positive"
        );
        ensure!(
            self.payload.max_size_bytes > 0,
            "payload max-size-bytes must be positive"
        );
        ensure!(
            !self.payload.overall_timeout.is_zero(),
            "payload overall-timeout must be positive"
        );
        if let Strategy::PerBuyerLimits { buyers } = &self.payload.strategy {
            let mut seen = HashSet::new();
            for target in buyers {
                ensure!(
                    seen.insert(&target.buyer),
                    "buyer {} has more than one target size",
                    target.buyer
                );
            }
        }
        Ok(self)
    }
}

/// Timeouts and resources of on-device auctions.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Auction {
    /// Deadline of a whole auction run.
    #[serde(with = "humantime_serde", default = "default_overall_timeout")]
    pub overall_timeout: Duration,

    #[serde(
        with = "humantime_serde",
        default = "default_bidding_timeout_per_candidate"
    )]
    pub bidding_timeout_per_candidate: Duration,

    #[serde(with = "humantime_serde", default = "default_scoring_timeout")]
    pub scoring_timeout: Duration,

    /// Maximum number of buyers bidding in parallel. Also bounded by the
    /// available hardware parallelism.
    #[serde(default = "default_concurrent_bidding_count")]
    pub concurrent_bidding_count: usize,

    /// Only candidates active within this window take part.
    #[serde(with = "humantime_serde", default = "default_candidate_active_window")]
    pub candidate_active_window: Duration,

    /// Candidates of these owners never take part.
    #[serde(default)]
    pub denied_owners: Vec<String>,
}

impl Default for Auction {
    fn default() -> Self {
        Self {
            overall_timeout: default_overall_timeout(),
            bidding_timeout_per_candidate: default_bidding_timeout_per_candidate(),
            scoring_timeout: default_scoring_timeout(),
            concurrent_bidding_count: default_concurrent_bidding_count(),
            candidate_active_window: default_candidate_active_window(),
            denied_owners: Vec::new(),
        }
    }
}

fn default_overall_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_bidding_timeout_per_candidate() -> Duration {
    Duration::from_secs(5)
}

fn default_scoring_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_concurrent_bidding_count() -> usize {
    6
}

fn default_candidate_active_window() -> Duration {
    Duration::from_secs(60 * 24 * 60 * 60)
}
