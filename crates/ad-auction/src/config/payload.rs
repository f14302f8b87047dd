use {
    buyer_input::{CompressionVersion, Packer},
    model::BuyerId,
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Payload {
    /// Upper bound of the total compressed payload size.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: usize,

    /// Buyer signals are budgeted with this size regardless of their actual
    /// size.
    #[serde(default = "default_per_buyer_signals_max_size_bytes")]
    pub per_buyer_signals_max_size_bytes: usize,

    #[serde(default = "default_compression")]
    pub compression: CompressionVersion,

    /// Leave out ad render ids of candidates that allow it.
    #[serde(default)]
    pub omit_ads: bool,

    #[serde(with = "humantime_serde", default = "default_overall_timeout")]
    pub overall_timeout: Duration,

    #[serde(default)]
    pub strategy: Strategy,
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            per_buyer_signals_max_size_bytes: default_per_buyer_signals_max_size_bytes(),
            compression: default_compression(),
            omit_ads: false,
            overall_timeout: default_overall_timeout(),
            strategy: Strategy::default(),
        }
    }
}

impl Payload {
    pub fn packer(&self) -> Packer {
        Packer::new(
            buyer_input::compression::for_version(self.compression),
            self.max_size_bytes,
            self.per_buyer_signals_max_size_bytes,
            self.omit_ads,
            (&self.strategy).into(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(
    tag = "kind",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    deny_unknown_fields
)]
pub enum Strategy {
    SellerMax {
        #[serde(default = "default_max_recalculations")]
        max_recalculations: usize,
    },
    PerBuyerLimits {
        #[serde(default)]
        buyers: Vec<BuyerTarget>,
    },
}

impl Default for Strategy {
    fn default() -> Self {
        Self::SellerMax {
            max_recalculations: default_max_recalculations(),
        }
    }
}

impl From<&Strategy> for buyer_input::Strategy {
    fn from(value: &Strategy) -> Self {
        match value {
            Strategy::SellerMax { max_recalculations } => Self::SellerMax {
                max_recalculations: *max_recalculations,
            },
            Strategy::PerBuyerLimits { buyers } => Self::PerBuyerLimits {
                targets: buyers
                    .iter()
                    .map(|target| (target.buyer.clone(), target.target_size_bytes))
                    .collect(),
            },
        }
    }
}

/// Desired share of the payload of a single buyer.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuyerTarget {
    pub buyer: BuyerId,
    pub target_size_bytes: usize,
}

fn default_max_size_bytes() -> usize {
    20 * 1024
}

fn default_per_buyer_signals_max_size_bytes() -> usize {
    1024
}

fn default_compression() -> CompressionVersion {
    CompressionVersion::Gzip
}

fn default_overall_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_recalculations() -> usize {
    10
}
