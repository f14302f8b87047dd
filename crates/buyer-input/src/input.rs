//! Per packing run state shared by both strategies.

use {
    crate::{
        Error,
        compression::{CompressedData, Compressor},
        encoding::{BuyerInput, CandidateRecord},
    },
    indexmap::IndexMap,
    model::{BuyerId, Candidate, EncodedSignals},
};

/// The encoded inputs of one buyer.
#[derive(Debug, Default)]
pub(crate) struct BuyerRecords<'a> {
    /// Sorted by descending priority.
    pub candidates: Vec<CandidateRecord>,
    pub signals: Option<&'a EncodedSignals>,
}

impl BuyerRecords<'_> {
    /// Container with every candidate and the signals of the buyer.
    pub fn full_input(&self) -> BuyerInput<'_> {
        let mut input = BuyerInput::with_candidates(&self.candidates);
        if let Some(signals) = self.signals {
            input.set_signals(signals);
        }
        input
    }
}

/// All encoded inputs of a packing run.
///
/// Buyers are ordered by their first appearance among the candidates followed
/// by buyers that only contribute signals. Every iteration over buyers uses
/// this order.
#[derive(Debug, Default)]
pub(crate) struct Inputs<'a> {
    pub buyers: IndexMap<&'a BuyerId, BuyerRecords<'a>>,
    /// All candidates in descending priority order as `(buyer, record)`
    /// indices into `buyers`.
    pub by_priority: Vec<(usize, usize)>,
}

impl<'a> Inputs<'a> {
    pub fn encode(
        candidates: &'a [Candidate],
        signals: &'a IndexMap<BuyerId, EncodedSignals>,
        omit_ads: bool,
    ) -> Result<Self, Error> {
        let mut buyers: IndexMap<&BuyerId, BuyerRecords> = IndexMap::new();
        for candidate in candidates {
            buyers.entry(&candidate.buyer).or_default();
        }

        let mut sorted: Vec<&Candidate> = candidates.iter().collect();
        sorted.sort_by(|a, b| Candidate::by_priority_desc(a, b));

        let mut by_priority = Vec::with_capacity(sorted.len());
        for candidate in sorted {
            let Some((buyer, _, records)) = buyers.get_full_mut(&candidate.buyer) else {
                continue;
            };
            records
                .candidates
                .push(CandidateRecord::encode(candidate, omit_ads)?);
            by_priority.push((buyer, records.candidates.len() - 1));
        }

        for (buyer, signals) in signals {
            buyers.entry(buyer).or_default().signals = Some(signals);
        }

        Ok(Self {
            buyers,
            by_priority,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.buyers.is_empty()
    }

    /// Empty accumulators, one per buyer.
    pub fn accumulators(&self) -> Accumulators<'_> {
        Accumulators(
            self.buyers
                .keys()
                .map(|buyer| (*buyer, BuyerInput::default()))
                .collect(),
        )
    }

    pub fn record(&self, (buyer, index): (usize, usize)) -> (&BuyerId, &CandidateRecord) {
        let (buyer, records) = self
            .buyers
            .get_index(buyer)
            .expect("priority index refers to known buyer");
        (*buyer, &records.candidates[index])
    }
}

/// What has been selected for the payload so far, per buyer.
#[derive(Debug)]
pub(crate) struct Accumulators<'a>(pub IndexMap<&'a BuyerId, BuyerInput<'a>>);

impl<'a> Accumulators<'a> {
    pub fn get_mut(&mut self, buyer: &BuyerId) -> &mut BuyerInput<'a> {
        self.0
            .get_mut(buyer)
            .expect("accumulators are created for every buyer")
    }

    /// Compresses every non-empty accumulator.
    pub fn compress(
        &self,
        compressor: &dyn Compressor,
    ) -> Result<IndexMap<BuyerId, CompressedData>, Error> {
        self.0
            .iter()
            .filter(|(_, input)| !input.is_empty())
            .map(|(buyer, input)| Ok(((**buyer).clone(), compress(compressor, input)?)))
            .collect()
    }

    /// Exact size of the payload if it was built from the current state.
    pub fn exact_size(&self, compressor: &dyn Compressor) -> Result<usize, Error> {
        Ok(total_size(&self.compress(compressor)?))
    }
}

pub(crate) fn compress(
    compressor: &dyn Compressor,
    input: &BuyerInput,
) -> Result<CompressedData, Error> {
    let data = compressor
        .compress(&input.encode()?)
        .map_err(Error::Compression)?;
    Ok(CompressedData {
        version: compressor.version(),
        data,
    })
}

pub(crate) fn total_size(buyers: &IndexMap<BuyerId, CompressedData>) -> usize {
    buyers.values().map(CompressedData::len).sum()
}
