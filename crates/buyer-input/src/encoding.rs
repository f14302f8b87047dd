//! Serialization of candidates and signals into the per-buyer container that
//! gets compressed and shipped to the remote auction.
//!
//! Every candidate is serialized exactly once per packing run. Containers are
//! assembled from the pre-serialized records so repeated size measurements
//! only pay for concatenation and compression.

use {
    model::{Candidate, EncodedSignals},
    serde::Serialize,
    serde_json::value::RawValue,
};

/// A candidate serialized into its wire format.
#[derive(Debug)]
pub struct CandidateRecord {
    pub priority: f64,
    pub ads: usize,
    json: Box<RawValue>,
}

impl CandidateRecord {
    /// Serializes the candidate. Ad render ids are left out if the candidate
    /// asks for it and `omit_ads` is enabled.
    pub fn encode(candidate: &Candidate, omit_ads: bool) -> Result<Self, serde_json::Error> {
        let omit_render_ids = omit_ads && candidate.omit_ads;
        let wire = CandidateWire {
            owner: &candidate.owner,
            name: &candidate.name,
            ads: candidate
                .ads
                .iter()
                .map(|ad| AdWire {
                    render_id: (!omit_render_ids).then_some(ad.render_id.as_str()),
                    metadata: &ad.metadata,
                })
                .collect(),
            trusted_bidding_keys: &candidate.trusted_bidding_keys,
            user_bidding_signals: &candidate.user_bidding_signals,
            priority: candidate.priority,
        };
        Ok(Self {
            priority: candidate.priority,
            ads: if omit_render_ids { 0 } else { candidate.ads.len() },
            json: serde_json::value::to_raw_value(&wire)?,
        })
    }

    /// Size of the serialized record in bytes.
    pub fn len(&self) -> usize {
        self.json.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.json.get().is_empty()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateWire<'a> {
    owner: &'a str,
    name: &'a str,
    ads: Vec<AdWire<'a>>,
    trusted_bidding_keys: &'a [String],
    user_bidding_signals: &'a str,
    priority: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    render_id: Option<&'a str>,
    metadata: &'a str,
}

/// Size of the signals once embedded in a container.
pub fn signals_len(signals: &EncodedSignals) -> Result<usize, serde_json::Error> {
    serde_json::to_vec(signals).map(|json| json.len())
}

/// Everything one buyer contributes to the payload.
///
/// Candidates are kept in descending priority order. Candidates with equal
/// priority stay in insertion order.
#[derive(Debug, Default, Clone)]
pub struct BuyerInput<'a> {
    candidates: Vec<&'a CandidateRecord>,
    signals: Option<&'a EncodedSignals>,
}

impl<'a> BuyerInput<'a> {
    pub fn with_candidates(candidates: impl IntoIterator<Item = &'a CandidateRecord>) -> Self {
        let mut input = Self::default();
        for candidate in candidates {
            input.insert(candidate);
        }
        input
    }

    pub fn insert(&mut self, candidate: &'a CandidateRecord) {
        let position = self
            .candidates
            .partition_point(|existing| existing.priority >= candidate.priority);
        self.candidates.insert(position, candidate);
    }

    /// Removes and returns the candidate with the lowest priority.
    pub fn pop_lowest(&mut self) -> Option<&'a CandidateRecord> {
        self.candidates.pop()
    }

    pub fn set_signals(&mut self, signals: &'a EncodedSignals) {
        self.signals = Some(signals);
    }

    pub fn candidates(&self) -> &[&'a CandidateRecord] {
        &self.candidates
    }

    pub fn ads(&self) -> usize {
        self.candidates.iter().map(|candidate| candidate.ads).sum()
    }

    pub fn has_signals(&self) -> bool {
        self.signals.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.signals.is_none()
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&ContainerWire {
            candidates: self
                .candidates
                .iter()
                .map(|candidate| &*candidate.json)
                .collect(),
            signals: self.signals,
        })
    }
}

#[derive(Serialize)]
struct ContainerWire<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    candidates: Vec<&'a RawValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signals: Option<&'a EncodedSignals>,
}
